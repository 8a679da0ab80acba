use crate::binding::{BindingAdapter, BindingRunner};
use crate::bus::EventBus;
use crate::converter::{ConverterRegistry, KindPrecedence};
use crate::device_cache::DeviceCache;
use crate::dispatcher::EventDispatcher;
use crate::scheduler::SchedulerHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything a binding needs from the rest of the system, constructed once and passed around explicitly.
#[derive(Debug, Clone)]
pub struct Core {
    bus: Arc<EventBus>,
    cache: Arc<DeviceCache>,
    registry: Arc<ConverterRegistry>,
    dispatcher: Arc<EventDispatcher>,
    scheduler: SchedulerHandle,
}

impl Core {
    pub fn new(precedence: KindPrecedence, command_timeout: Duration, scheduler: SchedulerHandle) -> Self {
        let bus = Arc::new(EventBus::new());
        let cache = Arc::new(DeviceCache::new(bus.clone()));
        let registry = Arc::new(ConverterRegistry::new(precedence));
        let dispatcher = Arc::new(EventDispatcher::new(bus.clone(), cache.clone(), registry.clone(), command_timeout));

        Core {
            bus,
            cache,
            registry,
            dispatcher,
            scheduler,
        }
    }

    /// Registers the binding's converters and makes it reachable for commands.
    /// The returned runner feeds the binding's inbound frames into the core.
    pub fn activate(&self, adapter: Arc<dyn BindingAdapter>) -> BindingRunner {
        info!(binding = adapter.id(), "🔌 Activating binding '{}'...", adapter.id());
        adapter.register_converters(&self.registry.for_binding(adapter.id()));
        self.dispatcher.register_binding(adapter.clone());
        info!(binding = adapter.id(), "🔌 Activating binding '{}'... OK", adapter.id());

        BindingRunner::new(adapter, self.cache.clone(), self.registry.clone(), self.dispatcher.clone())
    }

    /// Drops the binding's converters and evicts the devices it created.
    pub fn deactivate(&self, binding_id: &'static str) {
        info!(binding = binding_id, "🔌 Deactivating binding '{}'...", binding_id);
        self.dispatcher.remove_binding(binding_id);
        self.registry.remove_binding(binding_id);

        let owned = self
            .cache
            .all_devices()
            .into_iter()
            .filter(|device| device.binding_id() == binding_id)
            .collect::<Vec<_>>();
        for device in &owned {
            self.cache.remove(device.address());
        }
        info!(binding = binding_id, "🔌 Deactivating binding '{}'... OK, evicted {} device(s)", binding_id, owned.len());
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn cache(&self) -> &Arc<DeviceCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ConverterRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::line::{BINDING_ID, LineBinding};
    use crate::bus::Matcher;
    use crate::dispatcher::{DEFAULT_COMMAND_TIMEOUT, DispatchError};
    use crate::domain::commands::{Command, IncreaseDecrease};
    use crate::domain::events::BusEvent;
    use crate::domain::item::ItemBinding;
    use crate::domain::state::{OnOff, State, StateKind};
    use crate::scheduler::Schedule;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use test_log::test;
    use tokio::sync::mpsc;

    fn core() -> Core {
        let (scheduler, _task) = SchedulerHandle::spawn(8);
        Core::new(KindPrecedence::default(), DEFAULT_COMMAND_TIMEOUT, scheduler)
    }

    #[test(tokio::test)]
    async fn activation_registers_converters_and_deactivation_removes_them() {
        let core = core();
        let (tx, _rx) = mpsc::channel(1);
        let runner = core.activate(Arc::new(LineBinding::new(tx)));
        runner.handle_frame(b"+01 bulb").unwrap();

        assert!(core.registry().resolve_to_typed("BRIGHTNESS", &[StateKind::Percent]).is_some());
        assert_eq!(runner.binding_id(), BINDING_ID);

        core.deactivate(BINDING_ID);

        assert!(core.registry().is_empty());
        assert!(core.cache().get("01").is_none());
    }

    #[test(tokio::test)]
    async fn commands_round_trip_through_the_line_binding() {
        let core = core();
        let (tx, mut outbound) = mpsc::channel(1);
        let runner = core.activate(Arc::new(LineBinding::new(tx)));
        core.dispatcher().bind_item("lamp", ItemBinding::new(BINDING_ID, "01", None, "BRIGHTNESS"));
        runner.handle_frame(b"+01 bulb").unwrap();
        runner.handle_frame(b"01 BRIGHTNESS 102").unwrap();

        let remote = runner.clone();
        let device = tokio::spawn(async move {
            let frame = outbound.recv().await.unwrap();
            remote.handle_frame(b"ACK").unwrap();
            String::from_utf8(frame).unwrap()
        });

        core.dispatcher()
            .send_command("lamp", Command::IncreaseDecrease(IncreaseDecrease::Increase))
            .await
            .unwrap();

        assert_eq!(device.await.unwrap(), "01 BRIGHTNESS 128");
    }

    #[test(tokio::test)]
    async fn a_nak_from_the_device_rejects_the_command() {
        let core = core();
        let (tx, mut outbound) = mpsc::channel(1);
        let runner = core.activate(Arc::new(LineBinding::new(tx)));
        core.dispatcher().bind_item("lamp", ItemBinding::new(BINDING_ID, "01", None, "ON"));
        runner.handle_frame(b"+01 bulb").unwrap();

        let remote = runner.clone();
        tokio::spawn(async move {
            outbound.recv().await.unwrap();
            remote.handle_frame(b"NAK unreachable").unwrap();
        });

        let result = core.dispatcher().send_command("lamp", Command::State(State::OnOff(OnOff::On))).await;

        assert!(matches!(result, Err(DispatchError::CommandRejected { reason, .. }) if reason == "unreachable"));
    }

    #[test(tokio::test(start_paused = true))]
    async fn scheduled_commands_reach_the_device() {
        let core = core();
        let (tx, mut outbound) = mpsc::channel(4);
        let runner = core.activate(Arc::new(LineBinding::new(tx)));
        core.dispatcher().bind_item("lamp", ItemBinding::new(BINDING_ID, "01", Some(1), "ON"));
        runner.handle_frame(b"+01 bulb").unwrap();

        let dispatcher = core.dispatcher().clone();
        core.scheduler()
            .schedule("lamp-on", Schedule::interval(Duration::from_secs(60)).unwrap(), move || {
                let dispatcher = dispatcher.clone();
                async move {
                    dispatcher.send_command("lamp", Command::State(State::OnOff(OnOff::On))).await.ok();
                }
            })
            .await
            .unwrap();

        assert_eq!(outbound.recv().await.unwrap(), b"01:1 ON true".to_vec());
        runner.handle_frame(b"ACK").unwrap();
    }

    #[test(tokio::test)]
    async fn subscribers_see_topology_and_values() {
        let core = core();
        let (tx, _rx) = mpsc::channel(1);
        let runner = core.activate(Arc::new(LineBinding::new(tx)));
        let events = Arc::new(Mutex::new(vec![]));
        let captured = events.clone();
        core.dispatcher().subscribe_fn("all", Matcher::All, move |event: &BusEvent| {
            captured.lock().unwrap().push(serde_json::to_value(event).unwrap());
            Ok(())
        });

        runner.handle_frame(b"+07 sensor").unwrap();
        runner.handle_frame(b"07 TEMPERATURE 21.5").unwrap();
        runner.handle_frame(b"-07").unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["event"], "device_added");
        assert_eq!(events[1]["state"]["kind"], "Decimal");
        assert_eq!(events[1]["state"]["value"], "21.5");
        assert_eq!(events[2]["event"], "device_removed");
    }
}
