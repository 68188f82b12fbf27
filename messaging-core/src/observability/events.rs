//! Canonical structured event names used across `messaging-core`.

// Routing table events.
pub const ROUTING_ENTRY_ADD: &str = "routing_entry_add";
pub const ROUTING_ENTRY_UPDATE_REJECTED: &str = "routing_entry_update_rejected";
pub const ROUTING_ENTRY_REMOVE: &str = "routing_entry_remove";
pub const ROUTING_TABLE_PURGE: &str = "routing_table_purge";

// Stub cache and factory events.
pub const STUB_CREATE: &str = "stub_create";
pub const STUB_CREATE_FAILED: &str = "stub_create_failed";
pub const STUB_EVICT: &str = "stub_evict";
pub const STUB_FACTORY_REGISTER: &str = "stub_factory_register";

// Outbound routing events.
pub const ROUTE_START: &str = "route_start";
pub const ROUTE_NO_ROUTE: &str = "route_no_route";
pub const ROUTE_EXPIRED: &str = "route_expired";
pub const ROUTE_TRANSMIT_ATTEMPT: &str = "route_transmit_attempt";
pub const ROUTE_TRANSMIT_OK: &str = "route_transmit_ok";
pub const ROUTE_TRANSMIT_FAILED: &str = "route_transmit_failed";
pub const ROUTE_RETRY_SCHEDULED: &str = "route_retry_scheduled";
pub const ROUTE_RETRIES_EXHAUSTED: &str = "route_retries_exhausted";
pub const ROUTE_CALLBACK_DROPPED: &str = "route_callback_dropped";
pub const ROUTE_DETACHED_ABANDONED: &str = "route_detached_abandoned";
pub const ROUTER_SHUTDOWN: &str = "router_shutdown";

// Inbound events.
pub const INBOUND_RECEIVE: &str = "inbound_receive";
pub const INBOUND_DROP_EXPIRED: &str = "inbound_drop_expired";
pub const INBOUND_DROP_MISSING_REPLY_TO: &str = "inbound_drop_missing_reply_to";
pub const INBOUND_REPLY_TO_LEARNED: &str = "inbound_reply_to_learned";
pub const INBOUND_ROUTE_FAILED: &str = "inbound_route_failed";
pub const SKELETON_INIT: &str = "skeleton_init";
pub const SKELETON_SHUTDOWN: &str = "skeleton_shutdown";
pub const SKELETON_PROTOCOL_ERROR: &str = "skeleton_protocol_error";
pub const SKELETON_CHANNEL_CLOSED: &str = "skeleton_channel_closed";

// Subscription lifecycle events.
pub const SUBSCRIPTION_REGISTER: &str = "subscription_register";
pub const SUBSCRIPTION_REGISTER_REJECTED: &str = "subscription_register_rejected";
pub const SUBSCRIPTION_UNREGISTER: &str = "subscription_unregister";
pub const SUBSCRIPTION_UNKNOWN: &str = "subscription_unknown";
pub const SUBSCRIPTION_EXPIRED: &str = "subscription_expired";
pub const SUBSCRIPTION_TOUCH: &str = "subscription_touch";
pub const SUBSCRIPTION_REPLY: &str = "subscription_reply";
pub const PUBLICATION_DELIVER: &str = "publication_deliver";
pub const PUBLICATION_IN_TIME: &str = "publication_in_time";
pub const PUBLICATION_MISSED: &str = "publication_missed";
pub const MISSED_PUBLICATION_TIMER_STOP: &str = "missed_publication_timer_stop";
pub const SUBSCRIPTION_MANAGER_SHUTDOWN: &str = "subscription_manager_shutdown";

// Runtime events.
pub const RUNTIME_THREAD_NAME_FALLBACK: &str = "runtime_thread_name_fallback";
pub const RUNTIME_SPAWN_START: &str = "runtime_spawn_start";
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";
pub const RUNTIME_STOPPED: &str = "runtime_stopped";
