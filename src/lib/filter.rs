use std::collections::HashMap;

use log::{debug, warn};

use crate::lib::identifier::{IDLE_KEY, TitleParser, UNALLOCATED_KEY};

/// Keeps only entries whose namespace equals `namespace`, editing `rows` in place.
///
/// An empty filter leaves `rows` untouched. Otherwise the idle allocation is
/// always dropped (it has no namespace) and so is every key `parser` cannot
/// read, with a warning per dropped key.
pub fn filter_by_namespace<V>(
    rows: &mut HashMap<String, V>,
    namespace: &str,
    parser: &impl TitleParser,
) {
    if namespace.is_empty() {
        return;
    }

    let before = rows.len();
    rows.retain(|key, _| {
        if key == IDLE_KEY {
            return false;
        }

        match parser.namespace(key) {
            Ok(row_namespace) => row_namespace == namespace,
            Err(e) => {
                warn!("Failed to extract namespace from '{}', removing it: {}", key, e);
                false
            }
        }
    });

    debug!(
        "Namespace filter '{}' kept {} of {} entries",
        namespace,
        rows.len(),
        before
    );
}

/// Drops the unallocated bucket. Its controller attribution is meaningless.
pub fn exclude_unallocated<V>(rows: &mut HashMap<String, V>) {
    if rows.remove(UNALLOCATED_KEY).is_some() {
        debug!("Removed {} entry", UNALLOCATED_KEY);
    }
}
