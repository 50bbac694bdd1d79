//! Work Order / Location Join
//!
//! Work orders reference locations by name. The list view wants each order
//! carrying its location record, in a stable order.
//!
//! This is the join the work-order list function runs on the backend, which
//! reads work orders and locations from separate tables. `ApiClient` receives
//! the already-joined list, so the client never calls it; it is exported for
//! backend code that serves the list endpoint.

use std::collections::HashMap;

use tracing::debug;

use crate::models::workorder::{LocationDetails, WorkOrder};

/// Index locations by `location_name`. Nameless locations are skipped; on a
/// duplicate name the later record wins.
pub fn index_locations(
    locations: impl IntoIterator<Item = LocationDetails>,
) -> HashMap<String, LocationDetails> {
    let mut by_name = HashMap::new();
    for location in locations {
        match location.location_name.clone() {
            Some(name) => {
                by_name.insert(name, location);
            }
            None => debug!("skipping location without a name"),
        }
    }
    by_name
}

/// Attach each work order's location and sort the result by `work_order_id`.
///
/// Orders whose location is unknown get `location_details = None`. Sorting
/// compares ids as plain byte strings, so "WO-10" sorts before "WO-2".
pub fn join_locations(
    work_orders: impl IntoIterator<Item = WorkOrder>,
    locations: impl IntoIterator<Item = LocationDetails>,
) -> Vec<WorkOrder> {
    let by_name = index_locations(locations);

    let mut joined: Vec<WorkOrder> = work_orders
        .into_iter()
        .map(|mut order| {
            order.location_details = order
                .location_name
                .as_ref()
                .and_then(|name| by_name.get(name))
                .cloned();
            order
        })
        .collect();

    joined.sort_by(|a, b| a.work_order_id.cmp(&b.work_order_id));
    joined
}
