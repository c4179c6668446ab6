//! User onboarding demo
//!
//! Two queues of `UserModel`: every new registration fans out to a logger,
//! an onboarding mailer and a learning path assigner. The mailer forwards
//! each user into the onboarding queue, whose single group notifies the
//! organisation admin.

use crate::core::shutdown::ShutdownSignal;
use crate::queue::api::{
    ConsumerGroupConfig, EngineOptions, HandlerResult, ItemHandler, MetricsSnapshot,
    PublishOutcome, QueueResult, SmartQueueEngine,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A freshly registered user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserModel {
    pub id: String,
    pub email: String,
}

impl UserModel {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    /// A user with a random id and a `user<NNNN>@demo.com` address
    pub fn random() -> Self {
        let id = uuid::Uuid::new_v4();
        let number = 1000 + (id.as_u128() % 9000) as u32;
        Self::new(id.to_string(), format!("user{number}@demo.com"))
    }
}

/// Simulated processing time of each consumer group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkProfile {
    pub registration_log: Duration,
    pub onboarding_email: Duration,
    pub learning_path: Duration,
    pub onboarding_notify: Duration,
}

impl Default for WorkProfile {
    fn default() -> Self {
        Self {
            registration_log: Duration::from_millis(100),
            onboarding_email: Duration::from_millis(150),
            learning_path: Duration::from_millis(80),
            onboarding_notify: Duration::from_millis(100),
        }
    }
}

impl WorkProfile {
    /// No simulated work at all
    pub fn instant() -> Self {
        Self {
            registration_log: Duration::ZERO,
            onboarding_email: Duration::ZERO,
            learning_path: Duration::ZERO,
            onboarding_notify: Duration::ZERO,
        }
    }
}

async fn simulate_work(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

struct RegistrationLogger {
    work: Duration,
}

#[async_trait]
impl ItemHandler<UserModel> for RegistrationLogger {
    async fn handle(&self, user: UserModel) -> HandlerResult {
        simulate_work(self.work).await;
        log::info!("[Registered] User: {} - {}", user.id, user.email);
        Ok(())
    }
}

struct OnboardingEmail {
    work: Duration,
    onboarding: Arc<SmartQueueEngine<UserModel>>,
}

#[async_trait]
impl ItemHandler<UserModel> for OnboardingEmail {
    async fn handle(&self, user: UserModel) -> HandlerResult {
        simulate_work(self.work).await;
        log::info!("[Email] Onboarding email sent to: {}", user.email);
        self.onboarding.publish(user).await?;
        Ok(())
    }
}

struct LearningPath {
    work: Duration,
}

#[async_trait]
impl ItemHandler<UserModel> for LearningPath {
    async fn handle(&self, user: UserModel) -> HandlerResult {
        simulate_work(self.work).await;
        log::info!("[Learning] Assigned learning path to: {}", user.email);
        Ok(())
    }
}

struct OnboardingHandler {
    work: Duration,
}

#[async_trait]
impl ItemHandler<UserModel> for OnboardingHandler {
    async fn handle(&self, user: UserModel) -> HandlerResult {
        simulate_work(self.work).await;
        log::info!("[Notify] Sent notification to org admin for: {}", user.email);
        log::info!("[Kit] Org Kit sent for: {}", user.email);
        Ok(())
    }
}

/// The registration and onboarding queues with their consumer groups
pub struct DemoQueues {
    pub registration: Arc<SmartQueueEngine<UserModel>>,
    pub onboarding: Arc<SmartQueueEngine<UserModel>>,
}

impl DemoQueues {
    pub fn start(options: &EngineOptions, work: WorkProfile) -> QueueResult<Self> {
        let registration = Arc::new(SmartQueueEngine::new(options.clone())?);
        let onboarding = Arc::new(SmartQueueEngine::new(options.clone())?);

        registration.register_consumer_group(
            ConsumerGroupConfig::new("UserRegistrationLogger").with_item_handler(
                RegistrationLogger {
                    work: work.registration_log,
                },
            ),
        )?;
        registration.register_consumer_group(
            ConsumerGroupConfig::new("OnboardingEmail").with_item_handler(OnboardingEmail {
                work: work.onboarding_email,
                onboarding: Arc::clone(&onboarding),
            }),
        )?;
        registration.register_consumer_group(
            ConsumerGroupConfig::new("LearningPath").with_item_handler(LearningPath {
                work: work.learning_path,
            }),
        )?;
        onboarding.register_consumer_group(
            ConsumerGroupConfig::new("OnboardingHandler").with_item_handler(OnboardingHandler {
                work: work.onboarding_notify,
            }),
        )?;

        Ok(Self {
            registration,
            onboarding,
        })
    }

    /// Stop registration first so its drain can still feed onboarding
    pub async fn stop(&self) {
        self.registration.stop().await;
        self.onboarding.stop().await;
    }
}

/// What the demo should do
#[derive(Debug, Clone)]
pub struct DemoSettings {
    pub queue: EngineOptions,
    pub publish_interval: Duration,
    pub run_for: Option<Duration>,
    pub work: WorkProfile,
}

/// Counters reported when the demo ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoSummary {
    pub published: u64,
    pub discarded: u64,
    pub registration: MetricsSnapshot,
    pub onboarding: MetricsSnapshot,
}

/// Publish a new user every interval until shutdown or the run time ends
pub async fn run(settings: &DemoSettings, mut shutdown: ShutdownSignal) -> QueueResult<DemoSummary> {
    let queues = DemoQueues::start(&settings.queue, settings.work)?;
    let deadline = settings.run_for.map(|run_for| Instant::now() + run_for);
    let mut published = 0u64;
    let mut discarded = 0u64;

    log::info!(
        "Generating a registration every {:?}{}",
        settings.publish_interval,
        settings
            .run_for
            .map(|run_for| format!(" for {:?}", run_for))
            .unwrap_or_default()
    );

    let generated: QueueResult<()> = async {
        loop {
            let user = UserModel::random();
            match queues.registration.publish(user.clone()).await? {
                PublishOutcome::Accepted => {
                    published += 1;
                    log::info!("[Enqueue] New user added: {}", user.email);
                }
                PublishOutcome::Discarded => discarded += 1,
            }

            let pause = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    settings.publish_interval.min(remaining)
                }
                None => settings.publish_interval,
            };
            if shutdown.sleep(pause).await {
                log::info!("Shutdown requested, stopping traffic");
                break;
            }
        }
        Ok(())
    }
    .await;

    queues.stop().await;
    generated?;

    let summary = DemoSummary {
        published,
        discarded,
        registration: queues.registration.metrics().snapshot(),
        onboarding: queues.onboarding.metrics().snapshot(),
    };
    log::info!(
        "Demo finished: {} published, {} discarded, {} processed by registration groups, {} by onboarding",
        summary.published,
        summary.discarded,
        summary.registration.processed,
        summary.onboarding.processed
    );
    Ok(summary)
}
