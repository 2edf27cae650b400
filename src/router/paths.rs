// Path enumeration
// Generates candidate paths between the sell and buy token from venue
// descriptors alone. No I/O: on-chain existence of a hop is the adapter's
// problem at fetch time.
//
// Numan Thabit 2025 Nov

use std::collections::HashSet;

use crate::router::routes::{Hop, Path, MAX_HOPS};
use crate::token::Token;
use crate::venues::adapter::VenueDescriptor;

/// Enumerate direct paths, then (for `max_hops >= 2`) one path per allowed
/// intermediate and per combination of venue pools for both legs.
///
/// Output order is fixed by the inputs: direct paths in venue order, then
/// intermediates in caller order, each expanded venue-major.
pub fn enumerate_paths(
    sell: &Token,
    buy: &Token,
    intermediates: &[Token],
    max_hops: u8,
    venues: &[VenueDescriptor],
) -> Vec<Path> {
    let mut paths = Vec::new();
    if sell.key() == buy.key() || max_hops == 0 {
        return paths;
    }

    for venue in venues {
        for pool in venue.pools_for(sell, buy) {
            let hop = Hop::new(venue.id.clone(), sell.clone(), buy.clone(), pool);
            paths.extend(Path::new(vec![hop]));
        }
    }

    if max_hops.min(MAX_HOPS) < 2 {
        return paths;
    }

    let mut seen = HashSet::new();
    for mid in intermediates {
        let key = mid.key();
        if key == sell.key() || key == buy.key() || !seen.insert(key) {
            continue;
        }
        for first in venues {
            for first_pool in first.pools_for(sell, mid) {
                for second in venues {
                    for second_pool in second.pools_for(mid, buy) {
                        let hops = vec![
                            Hop::new(first.id.clone(), sell.clone(), mid.clone(), first_pool.clone()),
                            Hop::new(second.id.clone(), mid.clone(), buy.clone(), second_pool),
                        ];
                        paths.extend(Path::new(hops));
                    }
                }
            }
        }
    }
    paths
}
