use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::request::{InstalledXLocSet, RequestKind, SubmittedRequest};
use capability::CapabilityIssuer;
use metabridge::MetadataBridge;
use osd_facade::OsdClient;
use policy::{calculate_authoritative_state, decide, ReplicaStatus, UpdatePolicyTag, XLocSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Notify;

pub(crate) struct WorkerContext {
    pub config: CoordinatorConfig,
    pub issuer: Arc<CapabilityIssuer>,
    pub osd_client: OsdClient,
    pub metadata_bridge: MetadataBridge,
    pub shutdown: Arc<Notify>,
    pub quit: Arc<AtomicBool>,
}

/// Drains the FIFO queue one request at a time — the whole point being
/// that at most one reconfiguration is ever in flight.
pub(crate) async fn run(mut receiver: mpsc::UnboundedReceiver<SubmittedRequest>, ctx: WorkerContext) {
    while let Some(request) = receiver.recv().await {
        if ctx.quit.load(Ordering::SeqCst) {
            let _ = request.reply.send(Err(CoordinatorError::Shutdown));
            continue;
        }
        let reply = request.reply;
        let result = process(request.file_id, request.cur_xloc_set, request.ext_xloc_set, request.kind, &ctx).await;
        let _ = reply.send(result);
    }
}

async fn process(
    file_id: String,
    cur_xloc_set: XLocSet,
    ext_xloc_set: XLocSet,
    kind: RequestKind,
    ctx: &WorkerContext,
) -> Result<InstalledXLocSet, CoordinatorError> {
    let new_xlocs = match kind {
        RequestKind::AddReplicas { new_xlocs } => new_xlocs,
        RequestKind::RemoveReplicas { .. } => {
            return Err(CoordinatorError::InternalError(
                "RemoveReplicas is not implemented".to_string(),
            ))
        }
        RequestKind::ReplaceReplica { .. } => {
            return Err(CoordinatorError::InternalError(
                "ReplaceReplica is not implemented".to_string(),
            ))
        }
    };

    if ext_xloc_set.version != cur_xloc_set.version {
        return Err(CoordinatorError::UserError(format!(
            "extended XLocSet version {} does not match current version {}",
            ext_xloc_set.version, cur_xloc_set.version
        )));
    }

    // BUILD-CAP
    let cap = ctx.issuer.build(
        file_id.clone(),
        ctx.config.capability_timeout.0,
        ctx.config.client_identity(),
        cur_xloc_set.version,
    )?;

    // INVALIDATE-FANOUT, issued in extended-XLocSet order.
    let osd_order = ext_xloc_set.osd_order();
    let n = osd_order.len() as u32;
    let mut any_primary = false;
    let mut response_count: u32 = 0;
    let mut statuses: Vec<ReplicaStatus> = Vec::new();

    for osd in &osd_order {
        match ctx.osd_client.invalidate(*osd, &cap, &file_id).await {
            Ok(response) => {
                response_count += 1;
                if response.is_primary {
                    any_primary = true;
                }
                if let Some(status) = response.status {
                    statuses.push(status);
                }
            }
            Err(e) => {
                tracing::warn!(osd = %osd, error = %e, "invalidate failed for replica, treating as no status");
            }
        }
    }

    // Lease-wait rule: sleep iff no primary responded and not every
    // replica responded. An interrupt during the sleep does not shorten
    // it — only a shutdown does.
    if !any_primary && response_count < n {
        tokio::select! {
            _ = tokio::time::sleep(ctx.config.lease_timeout()) => {}
            _ = ctx.shutdown.notified() => {
                return Err(CoordinatorError::Shutdown);
            }
        }
    }

    if ctx.quit.load(Ordering::SeqCst) {
        return Err(CoordinatorError::Shutdown);
    }

    if response_count == 0 {
        return Err(CoordinatorError::InsufficientQuorum(
            "no replica responded to invalidate".to_string(),
        ));
    }

    let policy = ext_xloc_set.policy()?;

    if policy != UpdatePolicyTag::RONLY {
        let auth_state = calculate_authoritative_state(file_id.clone(), &statuses);
        // `decide` wants both replica-count arguments in the same unit —
        // OSDs, not XLoc entries, since a single XLoc can bundle several
        // OSDs for one stripe.
        let current_osd_count = cur_xloc_set.osd_order().len() as u32;
        let outcome = decide(policy, current_osd_count, n, &auth_state);

        // newReplicas.length counts individual OSDs being added, not XLoc
        // entries — a single XLoc can append more than one OSD to a stripe.
        let new_replica_count: usize = new_xlocs.iter().map(|x| x.osds.len()).sum();

        // The source asserts requiredUpdates < newReplicas.length, which is
        // wrong at the boundary: requiredUpdates == newReplicas.length means
        // every newly added replica gets primed, which is valid. Only a
        // strict excess is a real quorum shortfall.
        if outcome.required_updates as usize > new_replica_count {
            return Err(CoordinatorError::InsufficientQuorum(format!(
                "requiredUpdates={} > newReplicas.len()={}",
                outcome.required_updates, new_replica_count
            )));
        }

        // PRIME-NEW-REPLICAS: the last `required_updates` entries of the
        // extended list are the newly added tail.
        if outcome.required_updates > 0 {
            let prime_start = osd_order.len() - outcome.required_updates as usize;
            for osd in &osd_order[prime_start..] {
                if let Err(e) = ctx
                    .osd_client
                    .read_probe(*osd, &cap, &file_id, 0, 0, 0, 1)
                    .await
                {
                    tracing::warn!(osd = %osd, error = %e, "read-probe priming failed, continuing");
                }
            }
        }
    }
    // RONLY: no priming required synchronously; partial replicas install
    // as-is and get filled lazily in the background.

    // INSTALL-XLOCSET
    let installed = cur_xloc_set.bumped(ext_xloc_set.xlocs.clone());
    let version = installed.version;
    ctx.metadata_bridge.install(file_id.clone(), installed).await?;

    Ok(InstalledXLocSet { file_id, version })
}
