pub(crate) mod event_controller;
pub(crate) mod reservation_controller;
