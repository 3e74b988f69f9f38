//! Job templates and argument/environment rendering.
//!
//! A template is the write-once definition of how one unit of work runs:
//! container image, resource request, an ordered argument schema, and
//! default environment variables. Placeholders in the argument schema use
//! the `Ref::name` token form and are substituted at dispatch time from a
//! parameter map.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::TemplateId;

/// Prefix marking an argument-schema token as a named placeholder.
pub const PLACEHOLDER_PREFIX: &str = "Ref::";

/// Parameter name the dispatcher fills with the event's source location.
pub const PARAM_INPUT_BUCKET: &str = "inputBucket";

/// Parameter name the dispatcher fills with the event's object key.
pub const PARAM_OBJECT_KEY: &str = "objectKey";

/// Immutable definition of how a single file-processing job is run.
///
/// Registered once at configuration time and shared read-only by every job
/// instance rendered from it. Changing job behavior means registering a new
/// template, never mutating one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTemplate {
    pub id: TemplateId,
    /// Container image reference handed to the job executor.
    pub container_image: String,
    /// vCPUs requested per job.
    pub vcpus: u32,
    /// Memory requested per job, in MiB.
    pub memory_mib: u32,
    /// Ordered command-line tokens; `Ref::name` tokens are placeholders.
    pub argument_schema: Vec<String>,
    /// Environment defaults. Lowest precedence when rendering.
    pub environment_defaults: BTreeMap<String, String>,
}

impl JobTemplate {
    /// Build a template with a fresh id.
    pub fn new(
        container_image: impl Into<String>,
        vcpus: u32,
        memory_mib: u32,
        argument_schema: Vec<String>,
        environment_defaults: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            container_image: container_image.into(),
            vcpus,
            memory_mib,
            argument_schema,
            environment_defaults,
        }
    }

    /// The canonical vendor-feed schema:
    /// `--inputBucket Ref::inputBucket --objectKey Ref::objectKey`.
    pub fn vendor_feed_argument_schema() -> Vec<String> {
        vec![
            "--inputBucket".to_string(),
            format!("{PLACEHOLDER_PREFIX}{PARAM_INPUT_BUCKET}"),
            "--objectKey".to_string(),
            format!("{PLACEHOLDER_PREFIX}{PARAM_OBJECT_KEY}"),
        ]
    }

    /// Render the argument schema against `params`.
    ///
    /// Literal tokens pass through unchanged and placeholder tokens are
    /// replaced by their parameter value, verbatim. An unresolved
    /// placeholder is a configuration defect and fails fast with
    /// [`CoreError::TemplateRender`].
    pub fn render_arguments(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<Vec<String>, CoreError> {
        self.argument_schema
            .iter()
            .map(|token| match token.strip_prefix(PLACEHOLDER_PREFIX) {
                Some(name) => params.get(name).cloned().ok_or_else(|| {
                    CoreError::TemplateRender(format!(
                        "Unresolved placeholder {PLACEHOLDER_PREFIX}{name} in argument schema"
                    ))
                }),
                None => Ok(token.clone()),
            })
            .collect()
    }

    /// Render the job environment.
    ///
    /// Precedence, lowest to highest: template defaults, then `overlay`
    /// (the fixed process context supplied by the dispatcher).
    pub fn render_environment(&self, overlay: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = self.environment_defaults.clone();
        env.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
