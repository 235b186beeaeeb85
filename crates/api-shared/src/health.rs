use crate::dto::HealthRes;

/// Simple health service shared by the REST server and any future front end.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Checks health without creating an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Ward is alive".into(),
        }
    }
}
