//! Key -> tier -> model escalation for one logical generation request.
//!
//! ```text
//! ResolvingModel ──► TryingKeys ──► StreamingResponse ──► Success
//!       ▲                │  ▲              │
//!       │                │  └── rotate ────┘ (failure before or mid-stream)
//!       │                ▼
//!       │         tier exhausted ──► demote premium -> regular, retry keys
//!       │                ▼
//!       └──── FallbackModel ◄── pool exhausted
//!                        ▼
//!               ExhaustedAllModels
//! ```
//!
//! Every rotation and fallback is reported as a `system` fragment. A model
//! is never tried twice within one request and at most
//! `max_model_attempts` models are tried, so cyclic fallbacks terminate.


use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use gemini_relay_types::{Fragment, RelayError, StreamRequest};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::common::metrics;
use super::key_pool::{Credential, KeyPool, KeyTier};
use super::retry::UpstreamFailure;
use super::state::ServiceState;

/// Fragments of one request, in emission order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Fragment> + Send>>;

enum Opened {
    Cancelled,
    Done(Result<super::upstream::TextStream, UpstreamFailure>),
}

enum Pulled {
    Cancelled,
    Next(Option<Result<String, UpstreamFailure>>),
}

pub struct ResilientStreamController {
    state: Arc<ServiceState>,
}

impl ResilientStreamController {
    pub fn new(state: Arc<ServiceState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServiceState> {
        &self.state
    }

    pub fn stream(&self, request: StreamRequest) -> FragmentStream {
        self.stream_with_cancel(request, CancellationToken::new())
    }

    /// Lazily run the request; nothing is sent until the stream is polled.
    ///
    /// Cancelling the token, or dropping the stream, aborts the in-flight call.
    pub fn stream_with_cancel(
        &self,
        request: StreamRequest,
        cancel: CancellationToken,
    ) -> FragmentStream {
        let state = Arc::clone(&self.state);

        let stream = async_stream::stream! {
            let pool = state.key_pool();
            let mut target: Option<String> = request.requested_model().map(str::to_string);
            let mut tried_models: HashSet<String> = HashSet::new();
            let mut failures: Vec<String> = Vec::new();

            loop {
                let model = match state.catalog().resolve(target.as_deref()) {
                    Ok(model) => model,
                    Err(e) => {
                        warn!(requested = ?target, error = %e, "Model resolution failed");
                        yield Fragment::error(e.to_string());
                        return;
                    },
                };

                if tried_models.contains(&model) || tried_models.len() >= state.max_model_attempts() {
                    let err = RelayError::ModelsExhausted { failures: failures.clone() };
                    error!(model = %model, attempts = tried_models.len(), "All models exhausted");
                    yield Fragment::error(err.to_string());
                    return;
                }
                tried_models.insert(model.clone());
                info!(model = %model, attempt = tried_models.len(), tier = %pool.tier(), "Trying model");

                let mut all_rate_limited = true;

                'tiers: loop {
                    let mut credential = pool.current();
                    let tier = credential.tier();
                    let tier_len = pool.active_len();
                    let mut tried_keys: HashSet<usize> = HashSet::new();

                    loop {
                        tried_keys.insert(credential.index());

                        let failure = if state.circuit_breaker().admit() {
                            let opened = tokio::select! {
                                biased;
                                () = cancel.cancelled() => Opened::Cancelled,
                                result = state.executor().execute(&model, &request, &credential) => Opened::Done(result),
                            };

                            match opened {
                                Opened::Cancelled => {
                                    info!(model = %model, "Request cancelled before response");
                                    yield Fragment::error(RelayError::Cancelled.to_string());
                                    return;
                                },
                                Opened::Done(Err(failure)) => failure.to_relay_error(&model),
                                Opened::Done(Ok(mut deltas)) => {
                                    let mut interrupted = None;
                                    loop {
                                        let pulled = tokio::select! {
                                            biased;
                                            () = cancel.cancelled() => Pulled::Cancelled,
                                            item = deltas.next() => Pulled::Next(item),
                                        };
                                        match pulled {
                                            Pulled::Cancelled => {
                                                info!(model = %model, "Request cancelled mid-stream");
                                                yield Fragment::error(RelayError::Cancelled.to_string());
                                                return;
                                            },
                                            Pulled::Next(Some(Ok(text))) => yield Fragment::content(text),
                                            Pulled::Next(Some(Err(failure))) => {
                                                interrupted = Some(failure);
                                                break;
                                            },
                                            Pulled::Next(None) => break,
                                        }
                                    }

                                    match interrupted {
                                        None => {
                                            info!(model = %model, tier = %credential.tier(), key_index = credential.index(), "Stream completed");
                                            return;
                                        },
                                        Some(failure) => failure.to_relay_error(&model),
                                    }
                                },
                            }
                        } else {
                            metrics::record_circuit_rejection();
                            RelayError::CircuitOpen {
                                retry_after_secs: state.circuit_breaker().retry_after().as_secs(),
                            }
                        };

                        metrics::record_upstream_failure(failure.kind());
                        warn!(
                            model = %model,
                            tier = %credential.tier(),
                            key_index = credential.index(),
                            kind = failure.kind(),
                            error = %failure,
                            "Key attempt failed"
                        );
                        if !failure.is_rate_limit() {
                            all_rate_limited = false;
                        }
                        failures.push(format!("{} [{}]", failure, describe_key(&credential)));

                        if tried_keys.len() >= tier_len {
                            break;
                        }
                        let Some(next) = next_untried(pool, tier, &tried_keys) else {
                            // Another request demoted the pool; indices tried so far were premium ones
                            info!(model = %model, "Key tier changed during rotation, restarting on regular keys");
                            yield Fragment::system("All premium API keys failed, switching to regular API keys...");
                            continue 'tiers;
                        };
                        credential = next;
                        metrics::record_key_rotation(credential.tier().as_str());
                        yield Fragment::system(format!(
                            "Retrying with next API key ({})...",
                            describe_key(&credential)
                        ));
                    }

                    if tier == KeyTier::Premium {
                        let switched = pool.demote();
                        if switched {
                            metrics::record_demotion();
                        }
                        if switched || pool.tier() == KeyTier::Regular {
                            yield Fragment::system("All premium API keys failed, switching to regular API keys...");
                            continue 'tiers;
                        }
                    }
                    break;
                }

                let exhausted = if all_rate_limited {
                    RelayError::AllKeysRateLimited { model: format!("model {}", model) }
                } else {
                    RelayError::AllKeysModelError { model: model.clone() }
                };
                warn!(model = %model, error = %exhausted, "Key pool exhausted for model");
                failures.push(exhausted.to_string());

                let fallback = target.as_deref().and_then(|t| state.catalog().fallback_of(t));
                let Some(fallback) = fallback else {
                    let err = RelayError::FallbackUnavailable { failures };
                    error!(model = %model, "No fallback model available");
                    yield Fragment::error(err.to_string());
                    return;
                };

                metrics::record_model_fallback();
                info!(from = %model, to = %fallback, "Falling back to next model");
                yield Fragment::system(format!(
                    "Model {} failed with every API key, trying fallback model {}...",
                    model, fallback
                ));
                target = Some(fallback);
            }
        };

        Box::pin(stream)
    }
}

fn describe_key(credential: &Credential) -> String {
    format!("{} key #{}", credential.tier(), credential.index() + 1)
}

/// Advance until a key of `tier` not yet tried comes up.
///
/// Returns `None` once the pool has left `tier`, since the tried indices
/// then belong to the other tier.
fn next_untried(pool: &KeyPool, tier: KeyTier, tried: &HashSet<usize>) -> Option<Credential> {
    let mut credential = pool.advance();
    for _ in 1..pool.active_len() {
        if credential.tier() != tier || !tried.contains(&credential.index()) {
            break;
        }
        credential = pool.advance();
    }
    (credential.tier() == tier).then_some(credential)
}
