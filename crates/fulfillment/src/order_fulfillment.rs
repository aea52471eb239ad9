//! Step names of the order-creation saga, in execution order.

/// Look up prices and check stock. Mutates nothing.
pub const STEP_PRICE_LOOKUP: &str = "price_lookup";

/// Create the order's appointment record.
pub const STEP_CREATE_APPOINTMENT: &str = "create_appointment";

/// Credit the order total to the seller's balance.
pub const STEP_CREDIT_SELLER: &str = "credit_seller";

/// Decrement stock for every line item.
pub const STEP_DECREMENT_STOCK: &str = "decrement_stock";

/// Persist the order record.
pub const STEP_PERSIST_ORDER: &str = "persist_order";
