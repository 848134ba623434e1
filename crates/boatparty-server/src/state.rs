use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::lifecycle::LifecycleController;
use crate::notify::Notifier;
use crate::store::SeaStore;
use crate::stripe::StripeClient;

pub struct AppState {
    pub config: Config,
    pub db: DatabaseConnection,
    pub stripe: StripeClient,
    pub notifier: Notifier,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config, db: DatabaseConnection) -> Self {
        let stripe = StripeClient::new(config.stripe_secret_key.clone());
        let notifier = Notifier::new(&config);
        Self {
            config,
            db,
            stripe,
            notifier,
        }
    }

    pub fn store(&self) -> SeaStore {
        SeaStore::new(self.db.clone())
    }

    pub fn controller(&self) -> LifecycleController<SeaStore, StripeClient, Notifier> {
        LifecycleController::new(self.store(), self.stripe.clone(), self.notifier.clone())
    }
}
