//! Render lifecycle controller.
//!
//! Owns generation requests end to end and emits events for presentation layers.
//! At most one render runs at a time; requests arriving meanwhile wait in a
//! single slot where a newer request replaces an older one.

use crate::model::GenerateEvent;
use crate::render::{Artifact, QrEncoder};
use crate::trigger::{self, GenerateError, GenerateRequest};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Commands emitted by UI layers to drive generation.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Generate(GenerateRequest),
    Quit,
}

/// Internal handle for a running render.
struct RenderCtx {
    id: u64,
    request: GenerateRequest,
    handle: Option<JoinHandle<Result<Artifact, GenerateError>>>,
}

/// Spawn a render on the blocking pool and return its handle.
fn start_render(
    encoder: &Arc<dyn QrEncoder>,
    id: u64,
    request: GenerateRequest,
    event_tx: &UnboundedSender<GenerateEvent>,
) -> RenderCtx {
    let encoder = Arc::clone(encoder);
    let job = request.clone();
    let handle = tokio::task::spawn_blocking(move || trigger::generate(encoder.as_ref(), &job));
    tracing::debug!(id, text = %request.text, "render started");
    let _ = event_tx.send(GenerateEvent::Started {
        id,
        text: request.text.clone(),
    });
    RenderCtx {
        id,
        request,
        handle: Some(handle),
    }
}

/// Serve generation commands until `Quit` (or until every sender is gone).
pub(crate) async fn run_controller(
    encoder: Arc<dyn QrEncoder>,
    event_tx: UnboundedSender<GenerateEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut next_id: u64 = 0;
    let mut render_ctx: Option<RenderCtx> = None;
    let mut queued: Option<(u64, GenerateRequest)> = None;
    let mut quit_pending = false;

    let res = loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !quit_pending => {
                match cmd {
                    Some(UiCommand::Generate(request)) => {
                        next_id += 1;
                        let id = next_id;
                        if render_ctx.is_some() {
                            let superseded = queued.replace((id, request)).map(|(old, _)| old);
                            let _ = event_tx.send(GenerateEvent::Queued { id });
                            if let Some(old) = superseded {
                                tracing::debug!(superseded = old, id, "queued request replaced");
                                let _ = event_tx.send(GenerateEvent::Info(
                                    "Waiting for the current render; older pending input skipped".into(),
                                ));
                            }
                        } else {
                            render_ctx = Some(start_render(&encoder, id, request, &event_tx));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // Let an in-flight render finish so its completion is not lost,
                        // but drop anything still waiting.
                        quit_pending = true;
                        queued = None;
                        if render_ctx.is_none() {
                            break Ok(());
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut render_ctx {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let (Some(join_res), Some(ctx)) = (maybe_done, render_ctx.take()) {
                    let id = ctx.id;
                    match join_res {
                        Ok(Ok(artifact)) => {
                            tracing::info!(id, text = %ctx.request.text, "QR code generated");
                            let _ = event_tx.send(GenerateEvent::Completed {
                                id,
                                request: ctx.request,
                                artifact: Box::new(artifact),
                            });
                        }
                        Ok(Err(error)) => {
                            tracing::error!(id, "render failed: {error}");
                            let _ = event_tx.send(GenerateEvent::Failed { id, error });
                        }
                        Err(e) => {
                            tracing::error!(id, "render task failed: {e}");
                            let _ = event_tx.send(GenerateEvent::Failed {
                                id,
                                error: GenerateError::MissingArtifact,
                            });
                        }
                    }
                    if quit_pending {
                        break Ok(());
                    }
                    if let Some((id, request)) = queued.take() {
                        render_ctx = Some(start_render(&encoder, id, request, &event_tx));
                    }
                }
            }
        }
    };

    res
}
