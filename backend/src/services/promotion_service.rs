//! The promotion engine: end-to-end orchestration of a promotion attempt.
//!
//! A paths promotion moves through distinct phases: resolve the candidate
//! set, run the target's validation rule-set, then either stop (dry-run or
//! rejection) or copy candidates into the target over a bounded worker
//! pool. A path enters `completed_paths` only after its copy fully
//! succeeds, so the result is always an exact rollback manifest, whatever
//! happens mid-batch. Group promotion reuses the same validation pipeline
//! but only mutates the target group's constituent list.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{AppError, PromotionError, Result};
use crate::models::{
    GroupPromoteRequest, GroupPromoteResult, PathsPromoteRequest, PathsPromoteResult, StoreKey,
    StoreType,
};
use crate::services::content_gateway::ContentGateway;
use crate::services::event_bus::EventBus;
use crate::services::store_service::StoreService;
use crate::services::validation::ValidationEngine;

/// Outcome of one copy task in the pool.
enum CopyOutcome {
    Copied(String),
    /// Not attempted: an earlier task had already failed.
    Skipped(String),
    Failed(String, String),
}

/// Orchestrates paths and group promotions.
pub struct PromotionService {
    stores: Arc<StoreService>,
    gateway: Arc<ContentGateway>,
    engine: Arc<ValidationEngine>,
    events: Arc<EventBus>,
    workers: usize,
    copy_timeout: Duration,
}

impl PromotionService {
    pub fn new(
        stores: Arc<StoreService>,
        gateway: Arc<ContentGateway>,
        engine: Arc<ValidationEngine>,
        events: Arc<EventBus>,
        workers: usize,
        copy_timeout: Duration,
    ) -> Self {
        Self {
            stores,
            gateway,
            engine,
            events,
            workers: workers.max(1),
            copy_timeout,
        }
    }

    /// Run a paths promotion to completion: resolve, validate, then copy
    /// (or stop after resolution for a dry-run).
    ///
    /// Rule rejections and mid-copy failures are reported in the returned
    /// result, not as errors; `Err` means the machinery itself failed
    /// (unknown stores, listing failures, a rule that could not execute).
    pub async fn promote_paths(&self, request: PathsPromoteRequest) -> Result<PathsPromoteResult> {
        self.check_paths_request(&request).await?;
        let promotion_id = format!("promo-{}", Uuid::new_v4());
        tracing::info!(
            id = %promotion_id,
            source = %request.source,
            target = %request.target,
            explicit_paths = request.paths.len(),
            dry_run = request.dry_run,
            "paths promotion received"
        );

        let context = self
            .engine
            .request_context(request.clone(), self.gateway.clone())
            .await;
        let paths = context.promotion_paths().await?;
        tracing::debug!(id = %promotion_id, candidates = paths.len(), "paths resolved");

        let validations = self.engine.validate(&context).await?;
        if !validations.is_valid() {
            tracing::info!(
                id = %promotion_id,
                rule_set = validations.rule_set.as_deref().unwrap_or(""),
                failed_rules = validations.errors.len(),
                "promotion rejected by validation"
            );
            self.events.emit_detail(
                "promotion.rejected",
                &promotion_id,
                json!({
                    "source": request.source.to_string(),
                    "target": request.target.to_string(),
                }),
            );
            return Ok(PathsPromoteResult::rejected(request, validations));
        }

        if request.dry_run {
            return Ok(PathsPromoteResult::dry_run(request, paths).with_validations(validations));
        }

        let (completed, error) = self.copy_paths(&request, &paths).await;
        let result = match error {
            None => {
                if request.purge_source {
                    self.purge_source(&request, &completed).await?;
                }
                PathsPromoteResult::completed(request, completed).with_validations(validations)
            }
            Some(message) => {
                let pending: BTreeSet<String> = &paths - &completed;
                PathsPromoteResult::failed(request, completed, pending, message)
                    .with_validations(validations)
            }
        };

        let event = if result.is_success() {
            "promotion.completed"
        } else {
            "promotion.failed"
        };
        tracing::info!(
            id = %promotion_id,
            completed = result.completed_paths.len(),
            pending = result.pending_paths.len(),
            error = result.error.as_deref().unwrap_or(""),
            "paths promotion finished"
        );
        self.events.emit_detail(
            event,
            &promotion_id,
            json!({
                "source": result.request.source.to_string(),
                "target": result.request.target.to_string(),
                "completed": result.completed_paths.len(),
            }),
        );
        Ok(result)
    }

    /// The paths a promotion of `source` into `target` would copy, without
    /// copying anything: a dry-run promotion's pending set.
    pub async fn promotable_paths(
        &self,
        source: StoreKey,
        target: StoreKey,
    ) -> Result<PathsPromoteResult> {
        let request = PathsPromoteRequest::new(source, target).dry_run();
        self.promote_paths(request).await
    }

    /// Undo a prior paths promotion: remove every completed path from the
    /// target, restoring it to the source first if the promotion purged.
    ///
    /// Idempotent — paths already absent from the target are counted as
    /// rolled back, not errors.
    pub async fn rollback_paths(&self, prior: PathsPromoteResult) -> Result<PathsPromoteResult> {
        let request = prior.request.clone();
        self.stores.get(&request.source).await?;
        self.stores.get(&request.target).await?;

        let mut rolled_back = BTreeSet::new();
        let mut error = None;
        for path in &prior.completed_paths {
            match self.rollback_one(&request, path).await {
                Ok(()) => {
                    rolled_back.insert(path.clone());
                }
                Err(e) => {
                    error = Some(format!("rollback of {path} failed: {e}"));
                    break;
                }
            }
        }

        tracing::info!(
            source = %request.source,
            target = %request.target,
            rolled_back = rolled_back.len(),
            error = error.as_deref().unwrap_or(""),
            "paths promotion rolled back"
        );
        self.events.emit_detail(
            "promotion.rolled_back",
            request.target.to_string(),
            json!({ "paths": rolled_back.len() }),
        );

        let result = match error {
            None => PathsPromoteResult::completed(request, rolled_back),
            Some(message) => {
                let pending: BTreeSet<String> = &prior.completed_paths - &rolled_back;
                PathsPromoteResult::failed(request, rolled_back, pending, message)
            }
        };
        Ok(result)
    }

    /// Add the source store to the target group's constituents, behind the
    /// same validation pipeline as a paths promotion.
    pub async fn promote_group(&self, request: GroupPromoteRequest) -> Result<GroupPromoteResult> {
        self.check_group_request(&request).await?;

        // Rules see the same context shape as a paths promotion; a rule-set
        // matching the group key can inspect source content or naming.
        let context = self
            .engine
            .request_context(
                PathsPromoteRequest::new(request.source.clone(), request.target.clone()),
                self.gateway.clone(),
            )
            .await;
        let validations = self.engine.validate(&context).await?;
        if !validations.is_valid() {
            return Ok(GroupPromoteResult::rejected(request, validations));
        }

        if request.dry_run {
            let mut result = GroupPromoteResult::completed(request);
            result.validations = Some(validations);
            return Ok(result);
        }

        let added = self
            .stores
            .add_constituent(&request.target, &request.source)
            .await?;
        if added {
            self.events.emit_detail(
                "promotion.group_completed",
                request.target.to_string(),
                json!({ "member": request.source.to_string() }),
            );
        } else {
            tracing::debug!(
                group = %request.target,
                member = %request.source,
                "group promotion was a no-op; member already present"
            );
        }
        let mut result = GroupPromoteResult::completed(request);
        result.validations = Some(validations);
        Ok(result)
    }

    /// Remove the source store from the target group's constituents.
    /// Idempotent — a member already absent is a no-op.
    pub async fn rollback_group(&self, request: GroupPromoteRequest) -> Result<GroupPromoteResult> {
        self.check_group_request(&request).await?;
        if request.dry_run {
            return Ok(GroupPromoteResult::completed(request));
        }

        let removed = self
            .stores
            .remove_constituent(&request.target, &request.source)
            .await?;
        if removed {
            self.events.emit_detail(
                "promotion.group_rolled_back",
                request.target.to_string(),
                json!({ "member": request.source.to_string() }),
            );
        }
        Ok(GroupPromoteResult::completed(request))
    }

    async fn check_paths_request(&self, request: &PathsPromoteRequest) -> Result<()> {
        self.stores.get(&request.source).await?;
        let target = self.stores.get(&request.target).await?;
        if !target.is_hosted() {
            return Err(AppError::Validation(format!(
                "paths promotion target must be a hosted store, got {}",
                request.target
            )));
        }
        if target.disabled {
            return Err(AppError::Conflict(format!(
                "target store {} is disabled",
                request.target
            )));
        }
        if request.purge_source && request.source.store_type() == StoreType::Group {
            return Err(AppError::Validation(format!(
                "cannot purge group source {}; groups hold no content of their own",
                request.source
            )));
        }
        Ok(())
    }

    async fn check_group_request(&self, request: &GroupPromoteRequest) -> Result<()> {
        self.stores.get(&request.source).await?;
        let target = self.stores.get(&request.target).await?;
        if !target.is_group() {
            return Err(AppError::Validation(format!(
                "group promotion target must be a group, got {}",
                request.target
            )));
        }
        Ok(())
    }

    /// Copy `paths` into the target over a bounded worker pool.
    ///
    /// The first failure stops new work from being issued; tasks already
    /// past the gate settle on their own. Hitting the wall-clock budget
    /// abandons the batch the same way. Either way the returned completed
    /// set holds exactly the fully-written paths.
    async fn copy_paths(
        &self,
        request: &PathsPromoteRequest,
        paths: &BTreeSet<String>,
    ) -> (BTreeSet<String>, Option<String>) {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let failure = Arc::new(Mutex::new(None::<String>));
        let mut tasks: JoinSet<Result<CopyOutcome>> = JoinSet::new();

        for path in paths {
            let path = path.clone();
            let source = request.source.clone();
            let target = request.target.clone();
            let gateway = self.gateway.clone();
            let semaphore = semaphore.clone();
            let failure = failure.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| AppError::Internal(format!("copy pool closed: {e}")))?;
                if failure.lock().await.is_some() {
                    return Ok(CopyOutcome::Skipped(path));
                }
                match copy_one(&gateway, &source, &target, &path).await {
                    Ok(()) => Ok(CopyOutcome::Copied(path)),
                    Err(e) => {
                        let message = e.to_string();
                        let mut first = failure.lock().await;
                        if first.is_none() {
                            *first = Some(format!("copy of {path} failed: {message}"));
                        }
                        Ok(CopyOutcome::Failed(path, message))
                    }
                }
            });
        }

        let mut completed = BTreeSet::new();
        let drained = tokio::time::timeout(self.copy_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(CopyOutcome::Copied(path))) => {
                        completed.insert(path);
                    }
                    Ok(Ok(CopyOutcome::Skipped(_) | CopyOutcome::Failed(..))) => {}
                    Ok(Err(e)) => {
                        let mut first = failure.lock().await;
                        if first.is_none() {
                            *first = Some(e.to_string());
                        }
                    }
                    Err(e) => {
                        let mut first = failure.lock().await;
                        if first.is_none() {
                            *first = Some(format!("copy task panicked: {e}"));
                        }
                    }
                }
            }
        })
        .await;

        if drained.is_err() {
            tasks.abort_all();
            let timeout = PromotionError::Timeout {
                elapsed_secs: self.copy_timeout.as_secs(),
            };
            return (completed, Some(timeout.to_string()));
        }
        let error = failure.lock().await.take();
        (completed, error)
    }

    /// Delete the copied paths from the source, after all copies succeeded.
    /// A purge failure is infrastructure-level: the promotion itself stands.
    async fn purge_source(
        &self,
        request: &PathsPromoteRequest,
        completed: &BTreeSet<String>,
    ) -> Result<()> {
        for path in completed {
            self.gateway.delete(&request.source, path).await?;
        }
        tracing::info!(
            source = %request.source,
            purged = completed.len(),
            "purged promoted paths from source"
        );
        Ok(())
    }

    async fn rollback_one(&self, request: &PathsPromoteRequest, path: &str) -> Result<()> {
        if request.purge_source {
            // Restore before delete, so an interrupted rollback never loses
            // the only copy.
            if let Some(bytes) = self.gateway.retrieve(&request.target, path).await? {
                if !self.gateway.exists(&request.source, path).await? {
                    self.gateway.store(&request.source, path, bytes).await?;
                }
            }
        }
        self.gateway.delete(&request.target, path).await?;
        Ok(())
    }
}

async fn copy_one(
    gateway: &ContentGateway,
    source: &StoreKey,
    target: &StoreKey,
    path: &str,
) -> Result<()> {
    let Some(bytes) = gateway.retrieve(source, path).await? else {
        return Err(AppError::Storage(format!("{path} is missing in {source}")));
    };
    gateway.store(target, path, bytes).await
}
