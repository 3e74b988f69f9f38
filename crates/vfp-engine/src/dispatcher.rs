//! Job dispatcher: the entry point for arrival notifications.
//!
//! `dispatch` validates the event, renders a job instance from the
//! registered template, and enqueues it. Called concurrently and
//! independently per event; no ordering is guaranteed between events and
//! no deduplication is performed; at-least-once upstream delivery means
//! duplicate submissions for the same object are possible and accepted.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use vfp_core::template::{PARAM_INPUT_BUCKET, PARAM_OBJECT_KEY};
use vfp_core::{ArrivalEvent, CoreError, JobId, JobInstance, TemplateId};

use crate::queue::JobQueue;
use crate::registry::TemplateRegistry;

/// Fixed environment context, immutable for the process lifetime.
///
/// Merged into every rendered job environment above template defaults.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    pub region: String,
    pub domain: String,
    pub realm: String,
    pub stage: String,
}

impl ProcessContext {
    fn as_environment(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("AWSRegion".to_string(), self.region.clone()),
            ("DOMAIN".to_string(), self.domain.clone()),
            ("REALM".to_string(), self.realm.clone()),
            ("Stage".to_string(), self.stage.clone()),
        ])
    }
}

/// Renders arrival events into queued job instances.
pub struct JobDispatcher {
    registry: Arc<TemplateRegistry>,
    queue: Arc<JobQueue>,
    template_id: TemplateId,
    context: ProcessContext,
}

impl JobDispatcher {
    /// Build a dispatcher bound to one registered template.
    pub fn new(
        registry: Arc<TemplateRegistry>,
        queue: Arc<JobQueue>,
        template_id: TemplateId,
        context: ProcessContext,
    ) -> Self {
        Self {
            registry,
            queue,
            template_id,
            context,
        }
    }

    /// Dispatch one arrival event, returning the id of the job it produced.
    ///
    /// Exactly one job instance is created per successful call. All errors
    /// are returned to the caller (the event source owns redelivery); no
    /// instance is created on any failure path.
    pub fn dispatch(&self, event: ArrivalEvent) -> Result<JobId, CoreError> {
        event.validate()?;

        let template = self.registry.get(self.template_id)?;

        let params = HashMap::from([
            (
                PARAM_INPUT_BUCKET.to_string(),
                event.source_location.clone(),
            ),
            (PARAM_OBJECT_KEY.to_string(), event.object_key.clone()),
        ]);
        let arguments = template.render_arguments(&params)?;
        let environment = template.render_environment(&self.context.as_environment());

        let job = JobInstance::new(&template, arguments, environment);
        let job_id = job.id;
        let position = self.queue.enqueue(job)?;

        tracing::info!(
            job_id = %job_id,
            object_key = %event.object_key,
            source_location = %event.source_location,
            position,
            "Job dispatched",
        );
        Ok(job_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;
    use vfp_core::{JobState, JobTemplate};
    use vfp_events::EventBus;

    fn context() -> ProcessContext {
        ProcessContext {
            region: "us-east-1".to_string(),
            domain: "prod".to_string(),
            realm: "USAmazon".to_string(),
            stage: "Prod".to_string(),
        }
    }

    fn dispatcher() -> (JobDispatcher, Arc<JobQueue>) {
        let registry = Arc::new(TemplateRegistry::new());
        let template_id = registry.register(JobTemplate::new(
            "vendor-feed-processor:1.0",
            1,
            512,
            JobTemplate::vendor_feed_argument_schema(),
            BTreeMap::from([("LOG_LEVEL".to_string(), "info".to_string())]),
        ));
        let queue = Arc::new(JobQueue::new(Arc::new(EventBus::default())));
        let dispatcher =
            JobDispatcher::new(registry, Arc::clone(&queue), template_id, context());
        (dispatcher, queue)
    }

    #[test]
    fn dispatch_renders_event_fields_verbatim() {
        let (dispatcher, queue) = dispatcher();
        let job_id = dispatcher
            .dispatch(ArrivalEvent::new(
                "feeds-bucket",
                "vendor123/2024-01-01.csv",
            ))
            .unwrap();

        let job = queue.job(job_id).unwrap();
        assert_eq!(
            job.rendered_arguments,
            vec![
                "--inputBucket",
                "feeds-bucket",
                "--objectKey",
                "vendor123/2024-01-01.csv",
            ]
        );
        assert_eq!(job.state, JobState::Queued);
    }

    #[test]
    fn dispatch_merges_process_context_over_template_defaults() {
        let (dispatcher, queue) = dispatcher();
        let job_id = dispatcher
            .dispatch(ArrivalEvent::new("feeds-bucket", "key.csv"))
            .unwrap();

        let env = queue.job(job_id).unwrap().rendered_environment;
        assert_eq!(env.get("AWSRegion").map(String::as_str), Some("us-east-1"));
        assert_eq!(env.get("DOMAIN").map(String::as_str), Some("prod"));
        assert_eq!(env.get("REALM").map(String::as_str), Some("USAmazon"));
        assert_eq!(env.get("Stage").map(String::as_str), Some("Prod"));
        // Template default survives the merge.
        assert_eq!(env.get("LOG_LEVEL").map(String::as_str), Some("info"));
    }

    #[test]
    fn malformed_event_creates_no_job() {
        let (dispatcher, queue) = dispatcher();
        let result = dispatcher.dispatch(ArrivalEvent::new("feeds-bucket", ""));
        assert_matches!(result, Err(CoreError::InvalidEvent(_)));
        assert!(queue.jobs().is_empty());
    }

    #[test]
    fn missing_template_surfaces_not_found() {
        let registry = Arc::new(TemplateRegistry::new());
        let queue = Arc::new(JobQueue::new(Arc::new(EventBus::default())));
        let dispatcher = JobDispatcher::new(registry, queue, Uuid::now_v7(), context());
        assert_matches!(
            dispatcher.dispatch(ArrivalEvent::new("bucket", "key")),
            Err(CoreError::NotFound { .. })
        );
    }

    #[test]
    fn duplicate_events_produce_distinct_jobs() {
        let (dispatcher, queue) = dispatcher();
        let event = ArrivalEvent::new("feeds-bucket", "same/key.csv");
        let first = dispatcher.dispatch(event.clone()).unwrap();
        let second = dispatcher.dispatch(event).unwrap();
        assert_ne!(first, second);
        assert_eq!(queue.jobs().len(), 2);
    }

    #[test]
    fn unresolved_placeholder_surfaces_render_error() {
        let registry = Arc::new(TemplateRegistry::new());
        let template_id = registry.register(JobTemplate::new(
            "img",
            1,
            512,
            vec!["Ref::somethingElse".to_string()],
            BTreeMap::new(),
        ));
        let queue = Arc::new(JobQueue::new(Arc::new(EventBus::default())));
        let dispatcher =
            JobDispatcher::new(registry, Arc::clone(&queue), template_id, context());

        assert_matches!(
            dispatcher.dispatch(ArrivalEvent::new("bucket", "key")),
            Err(CoreError::TemplateRender(_))
        );
        assert!(queue.jobs().is_empty());
    }
}
