//! Command execution against the TraderEdge core.

use crate::commands::Command;
use anyhow::{Context, Result, anyhow, bail};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use traderedge_core::clock::{Clock, SystemClock};
use traderedge_core::config::CoreConfig;
use traderedge_core::identity::{IdentityClient, LoginRequest, RegisterRequest};
use traderedge_core::payment::{PaymentEvent, PaymentReconciliationManager, ReconcileOutcome};
use traderedge_core::session::{
    AuthState, Principal, SessionEvent, SessionManager, SessionSupervisor, UserType,
};
use traderedge_core::store::{FileStorage, StorageBackend, UserDataStore};

/// One CLI process acting as a client tab
pub struct App {
    /// Shared state file, watched for other processes' changes in `watch`
    file: Option<(Arc<FileStorage>, Duration)>,
    store: Arc<UserDataStore>,
    supervisor: Arc<SessionSupervisor>,
    payments: PaymentReconciliationManager,
    identity: IdentityClient,
}

impl App {
    /// Wire the core components over `backend`
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built
    pub fn new(
        config: &CoreConfig,
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Arc::new(UserDataStore::new(backend, clock.clone()));
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            clock.clone(),
            config.session.clone(),
        ));
        let supervisor = Arc::new(SessionSupervisor::new(manager));
        let payments =
            PaymentReconciliationManager::from_config(store.clone(), config.payment.clone(), clock)
                .context("Failed to build payment clients")?;
        let identity =
            IdentityClient::new(&config.identity).context("Failed to build identity client")?;

        Ok(Self {
            file: None,
            store,
            supervisor,
            payments,
            identity,
        })
    }

    /// Open the state file named in `config` with the system clock
    ///
    /// # Errors
    ///
    /// Returns error if the state file cannot be opened
    pub fn open(config: &CoreConfig) -> Result<Self> {
        let backend = Arc::new(FileStorage::open(&config.storage.path).with_context(|| {
            format!(
                "Failed to open state file {}",
                config.storage.path.display()
            )
        })?);
        let mut app = Self::new(config, backend.clone(), Arc::new(SystemClock))?;
        app.file = Some((backend, config.storage.watch_interval));
        Ok(app)
    }

    pub fn supervisor(&self) -> &Arc<SessionSupervisor> {
        &self.supervisor
    }

    /// Execute one command and render its output
    ///
    /// # Arguments
    ///
    /// * `command` - Parsed command
    /// * `password` - Account password, required by `register` and `login`
    ///
    /// # Returns
    ///
    /// * `Result<String>` - Text to print on success
    ///
    /// # Errors
    ///
    /// Service errors are reported with their client-safe message.
    pub async fn execute(&self, command: Command, password: Option<String>) -> Result<String> {
        match command {
            Command::Register {
                first_name,
                last_name,
                email,
                plan,
            } => {
                let request = RegisterRequest {
                    first_name,
                    last_name,
                    email,
                    password: password.ok_or_else(|| anyhow!("A password is required"))?,
                    plan_type: plan,
                };
                let session = self
                    .identity
                    .register(&request)
                    .await
                    .map_err(|e| anyhow!(e.client_message()))?;
                let state = self.supervisor.login_identity(&session)?;
                Ok(format!(
                    "Registered and logged in.\n{}",
                    render_state(&state)
                ))
            }
            Command::Login { email } => {
                let request = LoginRequest {
                    email,
                    password: password.ok_or_else(|| anyhow!("A password is required"))?,
                };
                let session = self
                    .identity
                    .login(&request)
                    .await
                    .map_err(|e| anyhow!(e.client_message()))?;
                let state = self.supervisor.login_identity(&session)?;
                Ok(render_state(&state))
            }
            Command::AdminLogin { role, pin } => {
                if !self.supervisor.login_admin(role, &pin) {
                    bail!("Invalid PIN for {}", role);
                }
                Ok(render_state(&self.supervisor.current()))
            }
            Command::Logout(user_type) => {
                let state = self.supervisor.logout(user_type)?;
                Ok(format!(
                    "Logged out of the {} session.\n{}",
                    user_type,
                    render_state(&state)
                ))
            }
            Command::Status => {
                let state = self.supervisor.recompute();
                let validity = match state.user_type {
                    Some(_) if self.supervisor.manager().is_session_valid() => "valid",
                    Some(_) => "expired",
                    None => "none",
                };
                Ok(format!("{}\nsession: {}", render_state(&state), validity))
            }
            Command::Refresh => {
                if self.supervisor.manager().refresh_session() {
                    Ok("Session refreshed".to_string())
                } else {
                    bail!("No valid session to refresh")
                }
            }
            Command::Pay(event) => self.pay(event).await,
            Command::Receipt(payment_id) => {
                let receipt = self
                    .payments
                    .generate_payment_receipt(&payment_id)
                    .ok_or_else(|| anyhow!("No payment {} in history", payment_id))?;
                Ok(serde_json::to_string_pretty(&receipt)?)
            }
            Command::History => {
                let history = self.payments.payment_history();
                if history.is_empty() {
                    return Ok("No payments recorded".to_string());
                }
                Ok(history
                    .iter()
                    .map(|record| {
                        format!(
                            "{}  {:<13} {:>10.2} {:<4} {:<11} {}",
                            record.timestamp.format("%Y-%m-%d %H:%M"),
                            record.method.to_string(),
                            record.amount,
                            record.currency,
                            record.plan.to_string(),
                            record.payment_id
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            Command::Export => self
                .store
                .export_json()
                .ok_or_else(|| anyhow!("No user data to export")),
            Command::Import(path) => {
                let data = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                if !self.store.import_json(&data) {
                    bail!("{} is not a valid user data backup", path.display());
                }
                Ok(format!("Imported user data from {}", path.display()))
            }
            Command::Watch => bail!("'watch' runs until interrupted; use App::watch"),
        }
    }

    async fn pay(&self, event: PaymentEvent) -> Result<String> {
        let plan = event.plan();
        match self.payments.reconcile(&event).await {
            Ok(ReconcileOutcome::Applied(record)) => {
                if !self
                    .payments
                    .validate_payment_amount(plan.as_str(), record.amount)
                {
                    log::warn!(
                        "Payment {} of {:.2} {} does not match the {} list price",
                        record.payment_id,
                        record.amount,
                        record.currency,
                        plan
                    );
                }
                Ok(format!(
                    "Payment {} applied: {:.2} {}, plan {}",
                    record.payment_id, record.amount, record.currency, record.plan
                ))
            }
            Ok(ReconcileOutcome::AlreadyRecorded) => Ok(format!(
                "Payment {} was already recorded",
                event.payment_id()
            )),
            Err(e) => {
                log::debug!("Reconciliation failed: {}", e);
                Err(anyhow!(e.client_message()))
            }
        }
    }

    /// Print session changes until `shutdown` resolves
    ///
    /// Runs the auto-logout loop for the lifetime of the call. With a state
    /// file, the file is also polled so that commands run by other processes
    /// show up here.
    pub async fn watch<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut events = self.supervisor.subscribe();
        let auto_logout = self.supervisor.setup_auto_logout();
        let file_watch = self
            .file
            .as_ref()
            .map(|(storage, period)| storage.watch_changes(*period));
        println!("{}", render_state(&self.supervisor.recompute()));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                received = events.recv() => match received {
                    Ok(SessionEvent::StateChanged(state)) => println!("{}", render_state(&state)),
                    Ok(SessionEvent::Expired(user_type)) => {
                        println!("{} session expired", user_type)
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Skipped {} session events", skipped)
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        auto_logout.abort();
        if let Some(handle) = file_watch {
            handle.abort();
        }
        Ok(())
    }
}

/// Human-readable summary of an [`AuthState`]
pub fn render_state(state: &AuthState) -> String {
    let (Some(user_type), Some(principal)) = (state.user_type, state.user.as_ref()) else {
        return "Not logged in".to_string();
    };
    match principal {
        Principal::User(user) => format!(
            "Logged in as {} <{}> ({}), plan {} ({})",
            user.username,
            user.email,
            UserType::User,
            user.plan,
            user.subscription_status
        ),
        Principal::Staff { username, .. } => {
            format!("Logged in as {} ({})", username, user_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traderedge_core::session::StaffRole;

    #[test]
    fn test_render_unauthenticated() {
        assert_eq!(render_state(&AuthState::unauthenticated()), "Not logged in");
    }

    #[test]
    fn test_render_staff() {
        let state = AuthState {
            is_authenticated: true,
            user: Some(Principal::Staff {
                role: StaffRole::CustomerService,
                username: "cs".to_string(),
            }),
            token: Some("staff_token".to_string()),
            user_type: Some(UserType::CustomerService),
        };
        assert_eq!(render_state(&state), "Logged in as cs (customer-service)");
    }
}
