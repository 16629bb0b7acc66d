//! HTTP front end for reelmerge.
//!
//! Exposes the job lifecycle as five routes:
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `POST /create-job` | create a job from form field `total_videos` |
//! | `POST /add-video/{job_id}` | upload one chunk as multipart field `file` |
//! | `GET /status/{job_id}` | poll the job |
//! | `GET /download/{job_id}` | stream the combined output |
//! | `GET /healthz` | liveness |

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{router, AppState, ReelmergeServer};
