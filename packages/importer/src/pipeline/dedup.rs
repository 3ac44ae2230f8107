//! Two-tier company dedup: the current batch first, then persisted rows.
//!
//! Matching is by exact company name. One hash lookup per listing.

use std::collections::HashMap;
use tracing::debug;

use crate::types::ids::{BillingAddressId, CompanyId};
use crate::types::listing::{ExternalListing, Resolved};

/// Ids resolved for one company name earlier in the batch.
#[derive(Debug, Clone, Copy)]
struct BatchEntry {
    source_enterprise_id: Option<u64>,
    company_id: CompanyId,
    billing_address_id: BillingAddressId,
}

/// Per-run index from company name to the ids already resolved for it.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    by_name: HashMap<String, Vec<BatchEntry>>,
    key_on_source_enterprise_id: bool,
}

impl DuplicateIndex {
    pub fn new(key_on_source_enterprise_id: bool) -> Self {
        Self {
            by_name: HashMap::new(),
            key_on_source_enterprise_id,
        }
    }

    /// First earlier entry that matches. With source-id keying, an unknown
    /// id on either side matches anything with the same name.
    fn find(&self, name: &str, source_enterprise_id: Option<u64>) -> Option<&BatchEntry> {
        let entries = self.by_name.get(name)?;
        if !self.key_on_source_enterprise_id {
            return entries.first();
        }
        entries.iter().find(|entry| {
            match (entry.source_enterprise_id, source_enterprise_id) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        })
    }

    fn insert(&mut self, name: &str, entry: BatchEntry) {
        self.by_name.entry(name.to_string()).or_default().push(entry);
    }
}

/// What dedup decided for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub batch_matches: usize,
    pub existing_companies: usize,
    pub existing_billing_addresses: usize,
    pub new_companies: usize,
    pub new_billing_addresses: usize,
}

/// Fill `enterprise_id` and `billing_address_id` on every listing, in
/// order; the first occurrence of a company wins.
pub fn resolve(
    batch: &mut [ExternalListing],
    existing_companies: &HashMap<String, CompanyId>,
    existing_billing_addresses: &HashMap<String, (BillingAddressId, CompanyId)>,
    key_on_source_enterprise_id: bool,
) -> DedupStats {
    let mut index = DuplicateIndex::new(key_on_source_enterprise_id);
    let mut stats = DedupStats::default();

    for listing in batch.iter_mut() {
        let source_id = listing.known_source_enterprise_id();

        if let Some(entry) = index.find(&listing.company_name, source_id) {
            listing.enterprise_id = Some(Resolved::Batch(entry.company_id));
            listing.billing_address_id = Some(Resolved::Batch(entry.billing_address_id));
            stats.batch_matches += 1;
            continue;
        }

        let company = match existing_companies.get(&listing.company_name) {
            Some(id) => {
                stats.existing_companies += 1;
                Resolved::Existing(*id)
            }
            None => {
                stats.new_companies += 1;
                Resolved::New(CompanyId::new())
            }
        };
        let billing = match existing_billing_addresses.get(&listing.company_name) {
            Some((id, _)) => {
                stats.existing_billing_addresses += 1;
                Resolved::Existing(*id)
            }
            None => {
                stats.new_billing_addresses += 1;
                Resolved::New(BillingAddressId::new())
            }
        };

        index.insert(
            &listing.company_name,
            BatchEntry {
                source_enterprise_id: source_id,
                company_id: company.id(),
                billing_address_id: billing.id(),
            },
        );
        listing.enterprise_id = Some(company);
        listing.billing_address_id = Some(billing);
    }

    debug!(
        listings = batch.len(),
        batch_matches = stats.batch_matches,
        new_companies = stats.new_companies,
        "Dedup resolved batch"
    );
    stats
}
