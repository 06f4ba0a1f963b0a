pub mod setting_engine;

use std::sync::Arc;

use setting_engine::*;

use crate::device::Device;
use crate::handler::fake_handler::FakeHandlerFactory;
use crate::handler::HandlerFactory;

/// DeviceBuilder assembles a Device from a handler factory and a
/// SettingEngine. A builder without a factory uses FakeHandler.
#[derive(Default)]
pub struct DeviceBuilder {
    setting_engine: Option<Arc<SettingEngine>>,
    handler_factory: Option<HandlerFactory>,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        DeviceBuilder::default()
    }

    pub fn build(mut self) -> Device {
        let setting_engine = if let Some(setting_engine) = self.setting_engine.take() {
            setting_engine
        } else {
            Arc::new(SettingEngine::default())
        };
        let handler_factory = if let Some(handler_factory) = self.handler_factory.take() {
            handler_factory
        } else {
            FakeHandlerFactory::new().handler_factory()
        };

        Device::new(handler_factory, setting_engine)
    }

    /// with_setting_engine allows providing a SettingEngine to the Device.
    /// Settings should not be changed after passing the engine to a Device.
    pub fn with_setting_engine(mut self, setting_engine: SettingEngine) -> Self {
        self.setting_engine = Some(Arc::new(setting_engine));
        self
    }

    /// with_handler_factory selects the native engine every Transport of
    /// the Device runs on.
    pub fn with_handler_factory(mut self, handler_factory: HandlerFactory) -> Self {
        self.handler_factory = Some(handler_factory);
        self
    }
}
