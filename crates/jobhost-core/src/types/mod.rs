//! Job descriptor and trigger types shared between the scheduler and job runners.

pub mod job_data;
pub mod trigger;

pub use job_data::{JobDataMap, PLUGIN_PATH_KEY};
pub use trigger::{PLUGIN_JOB_KIND, TriggerConfig};
