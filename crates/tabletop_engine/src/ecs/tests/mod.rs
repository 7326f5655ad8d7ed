//! Engine-level tests: systems, managers and events working together

mod event_flow;
