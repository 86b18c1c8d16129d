#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use screenstack::{
    CloseListener, Controller, ControllerDescriptor, ControllerFactory, ControllerKind,
    PresentContext, Presenter, PresenterBuilder, View, ViewFactory, ViewRequest,
};

pub const SCREEN: ControllerKind = ControllerKind("screen");
pub const POPUP: ControllerKind = ControllerKind("popup");
pub const OVERLAY: ControllerKind = ControllerKind("overlay");
pub const FADING: ControllerKind = ControllerKind("fading");
pub const BROKEN: ControllerKind = ControllerKind("broken");

pub const TICK: Duration = Duration::from_millis(16);

pub type EventLog = Arc<Mutex<Vec<String>>>;
pub type CloseSlot = Arc<Mutex<Option<CloseListener>>>;

pub fn log_event(log: &EventLog, text: impl Into<String>) {
    log.lock().unwrap().push(text.into());
}

/// Future that stays pending for a fixed number of polls. Stands in for view
/// fade transitions, one poll per presenter tick.
pub struct Countdown(pub usize);

impl Future for Countdown {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.0 == 0 {
            Poll::Ready(())
        } else {
            self.0 -= 1;
            Poll::Pending
        }
    }
}

pub struct TestView {
    label: String,
    events: EventLog,
    close_slot: CloseSlot,
    fade_ticks: usize,
}

impl View for TestView {
    fn dispose(&mut self) -> Result<()> {
        log_event(&self.events, format!("view-dispose:{}", self.label));
        Ok(())
    }

    fn set_close_listener(&mut self, listener: CloseListener) {
        *self.close_slot.lock().unwrap() = Some(listener);
    }

    fn transition_in(&mut self) -> Option<BoxFuture<'static, ()>> {
        (self.fade_ticks > 0).then(|| Countdown(self.fade_ticks).boxed())
    }

    fn transition_out(&mut self) -> Option<BoxFuture<'static, ()>> {
        (self.fade_ticks > 0).then(|| Countdown(self.fade_ticks).boxed())
    }
}

pub struct TestViewFactory {
    pub events: EventLog,
    pub close_slot: CloseSlot,
}

#[async_trait]
impl ViewFactory for TestViewFactory {
    async fn create_view(&self, request: &ViewRequest) -> Result<Box<dyn View>> {
        if request.resource_key == "missing" {
            return Err(anyhow!("no view resource named '{}'", request.resource_key));
        }
        log_event(
            &self.events,
            format!("view-create:{}:z{}", request.resource_key, request.z_index),
        );
        let fade_ticks = if request.resource_key == "fading" { 2 } else { 0 };
        Ok(Box::new(TestView {
            label: request.resource_key.clone(),
            events: self.events.clone(),
            close_slot: self.close_slot.clone(),
            fade_ticks,
        }))
    }
}

pub struct TestController {
    events: EventLog,
    timer: Option<Duration>,
}

impl Controller for TestController {
    fn on_present(&mut self, ctx: &PresentContext) -> Result<()> {
        log_event(&self.events, format!("present:{}#{}", ctx.kind(), ctx.id()));
        if let Some(timeout) = self.timer.take() {
            let events = self.events.clone();
            ctx.schedule(timeout, move |ctx| {
                log_event(&events, format!("timer-fired:#{}", ctx.id()));
                ctx.dismiss();
            });
        }
        Ok(())
    }

    fn on_activate(&mut self, ctx: &PresentContext) -> Result<()> {
        log_event(&self.events, format!("activate:{}#{}", ctx.kind(), ctx.id()));
        Ok(())
    }

    fn on_deactivate(&mut self, ctx: &PresentContext) -> Result<()> {
        log_event(
            &self.events,
            format!("deactivate:{}#{}", ctx.kind(), ctx.id()),
        );
        Ok(())
    }

    fn on_dismiss(&mut self, ctx: &PresentContext) -> Result<()> {
        log_event(&self.events, format!("dismiss:{}#{}", ctx.kind(), ctx.id()));
        Ok(())
    }

    fn handle_command(&mut self, ctx: &PresentContext, name: &str, _args: &Value) -> bool {
        log_event(
            &self.events,
            format!("command:{}#{}:{}", ctx.kind(), ctx.id(), name),
        );
        match name {
            "ping" => true,
            "dismiss-self" => {
                ctx.dismiss();
                true
            }
            _ => false,
        }
    }
}

pub struct TestControllerFactory {
    pub events: EventLog,
}

impl ControllerFactory for TestControllerFactory {
    fn create_controller(
        &self,
        kind: ControllerKind,
        _ctx: &PresentContext,
        args: &Value,
        _view: &mut dyn View,
    ) -> Result<Box<dyn Controller>> {
        if args.get("fail_controller").is_some() {
            return Err(anyhow!("controller for {} refused to build", kind));
        }
        let timer = args
            .get("timer_ms")
            .and_then(Value::as_u64)
            .map(Duration::from_millis);
        Ok(Box::new(TestController {
            events: self.events.clone(),
            timer,
        }))
    }
}

pub struct Stack {
    pub presenter: Presenter,
    pub events: EventLog,
    pub close_slot: CloseSlot,
    pub reported: EventLog,
}

impl Stack {
    pub fn tick(&mut self) {
        self.presenter.update(TICK);
    }

    pub fn ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.tick();
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn reported(&self) -> Vec<String> {
        self.reported.lock().unwrap().clone()
    }

    /// The close listener the most recently created view received.
    pub fn take_close_listener(&self) -> CloseListener {
        self.close_slot
            .lock()
            .unwrap()
            .take()
            .expect("a view registered its close listener")
    }
}

pub fn stack() -> Stack {
    stack_with(|builder, _| builder)
}

/// Build the standard fixture; `configure` may add middleware or defaults and
/// receives the shared event log so interceptors can record into it.
pub fn stack_with(
    configure: impl FnOnce(PresenterBuilder, &EventLog) -> PresenterBuilder,
) -> Stack {
    let _ = env_logger::builder().is_test(true).try_init();
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let close_slot: CloseSlot = Arc::new(Mutex::new(None));
    let reported: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();

    let builder = Presenter::builder(
        TestViewFactory {
            events: events.clone(),
            close_slot: close_slot.clone(),
        },
        TestControllerFactory {
            events: events.clone(),
        },
    )
    .register(ControllerDescriptor::new(SCREEN))
    .register(ControllerDescriptor::new(POPUP).layer(1))
    .register(ControllerDescriptor::new(OVERLAY).layer(2).tag(7))
    .register(ControllerDescriptor::new(FADING).resource_key("fading"))
    .register(ControllerDescriptor::new(BROKEN).resource_key("missing"))
    .on_error(move |err| sink.lock().unwrap().push(err.to_string()));

    Stack {
        presenter: configure(builder, &events).build(),
        events,
        close_slot,
        reported,
    }
}
