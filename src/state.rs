use std::sync::Arc;
use crate::config::ApiConfig;
use crate::discord::CredentialValidator;
use crate::rate_limit::AdmissionController;
// app's shared state

pub struct AppState {
    pub controller: AdmissionController,       // per-client cadence and bans
    pub validator: Arc<dyn CredentialValidator>, // external token check
    pub api: ApiConfig,
}

impl AppState {
    pub fn new(
        controller: AdmissionController,
        validator: Arc<dyn CredentialValidator>,
        api: ApiConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            controller,
            validator,
            api,
        })
    }
}
