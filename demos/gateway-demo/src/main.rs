use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use weave_core::prelude::*;
use weave_core_macros::Component;

// ==================== Sinks ====================

trait Sink: Send + Sync {
    fn deliver(&self, topic: &str, message: &str);
}

#[derive(Component, Default)]
#[component(class = "gateway::ConsoleSink")]
#[castable(dyn Sink)]
#[property(name = "prefix", text = ConsoleSink::set_prefix)]
struct ConsoleSink {
    prefix: Mutex<String>,
}

impl ConsoleSink {
    fn set_prefix(&self, prefix: &str) {
        *self.prefix.lock() = prefix.to_string();
    }
}

impl Sink for ConsoleSink {
    fn deliver(&self, topic: &str, message: &str) {
        println!("{} {}: {}", self.prefix.lock(), topic, message);
    }
}

// ==================== Routing ====================

#[derive(Component, Default)]
#[component(class = "gateway::Router")]
#[property(name = "fallback", reference = Router::set_fallback)]
#[property(name = "topics", list = Router::set_topics)]
#[property(name = "routes", map = Router::set_routes)]
#[hook(name = "cleanup", call = Router::release)]
struct Router {
    fallback: Mutex<Option<Arc<dyn Sink>>>,
    topics: Mutex<Vec<String>>,
    routes: Mutex<BTreeMap<String, String>>,
}

impl Router {
    fn set_fallback(&self, sink: Arc<dyn Sink>) {
        *self.fallback.lock() = Some(sink);
    }

    fn set_topics(&self, topics: Vec<String>) {
        *self.topics.lock() = topics;
    }

    fn set_routes(&self, routes: BTreeMap<String, String>) {
        *self.routes.lock() = routes;
    }

    fn route(&self, topic: &str, message: &str) {
        if !self.topics.lock().iter().any(|t| t == topic) {
            tracing::warn!("Dropping message on unknown topic {}", topic);
            return;
        }

        let target = self.routes.lock().get(topic).cloned();
        tracing::debug!("Routing {} to {:?}", topic, target);

        if let Some(sink) = self.fallback.lock().as_ref() {
            sink.deliver(topic, message);
        }
    }

    fn release(&self) {
        self.fallback.lock().take();
    }
}

// ==================== Gateway ====================

#[derive(Component, Default)]
#[component(class = "gateway::Gateway")]
#[property(name = "name", text = Gateway::set_name)]
#[property(name = "port", integer = Gateway::set_port)]
#[property(name = "poll", time = Gateway::set_poll)]
#[property(name = "verbose", boolean = Gateway::set_verbose)]
#[property(name = "router", reference = Gateway::set_router)]
#[hook(name = "done", call = Gateway::validate)]
#[hook(name = "cleanup", call = Gateway::release)]
struct Gateway {
    name: Mutex<String>,
    port: Mutex<u16>,
    poll: Mutex<Duration>,
    verbose: Mutex<bool>,
    router: Mutex<Option<Arc<Router>>>,
}

impl Gateway {
    fn set_name(&self, name: &str) {
        *self.name.lock() = name.to_string();
    }

    fn set_port(&self, port: u16) {
        *self.port.lock() = port;
    }

    fn set_poll(&self, poll: Duration) {
        *self.poll.lock() = poll;
    }

    fn set_verbose(&self, verbose: bool) {
        *self.verbose.lock() = verbose;
    }

    fn set_router(&self, router: Arc<Router>) {
        *self.router.lock() = Some(router);
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.router.lock().is_none() {
            return Err(anyhow!("gateway {} has no router", self.name.lock()));
        }

        if self.poll.lock().is_zero() {
            return Err(anyhow!("gateway {} polls with a zero interval", self.name.lock()));
        }

        Ok(())
    }

    fn publish(&self, topic: &str, message: &str) {
        if let Some(router) = self.router.lock().as_ref() {
            router.route(topic, message);
        }
    }

    fn release(&self) {
        self.router.lock().take();
    }
}

// ==================== Main ====================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Arc::new(
        Environment::new()
            .with_property_source(TomlPropertySource::from_file("config/application.toml")?)
            .with_property_source(EnvironmentPropertySource::new("WEAVE_")),
    );

    LoggingConfig::from_env()
        .show_target(true)
        .with_environment(&environment)
        .init()?;

    let document = FactoryDocument::from_file("config/factory.toml")?;
    let mut context = ApplicationContext::builder()
        .environment(Arc::clone(&environment))
        .build(document)
        .context("failed to start gateway")?;

    let gateway = context.create_as::<Gateway>("main")?;
    tracing::info!(
        "Gateway {} listening on port {} (poll every {:?}, verbose: {})",
        gateway.name.lock(),
        gateway.port.lock(),
        gateway.poll.lock(),
        gateway.verbose.lock()
    );

    let poll = *gateway.poll.lock();
    let mut ticker = tokio::time::interval(poll);
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sequence += 1;
                gateway.publish("telemetry", &format!("sample #{}", sequence));
                if sequence % 20 == 0 {
                    gateway.publish("status", "alive");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                break;
            }
        }
    }

    drop(gateway);
    context.shutdown();
    Ok(())
}
