use std::collections::HashSet;

use crate::models::{Contact, EnrichedLead, Lead};

/// Distinct contact ids referenced by any lead, in first-seen order.
pub fn unique_contact_ids(leads: &[Lead]) -> Vec<i64> {
    let mut seen = HashSet::new();
    leads
        .iter()
        .flat_map(|lead| lead.contact_refs())
        .filter_map(|contact| contact.contact_id())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Replaces each lead's contact references with the matching contacts.
///
/// References missing from `contacts`, or without an integer id, become `None`;
/// leads with no embedded contacts get an empty list.
pub fn attach_contacts(leads: Vec<Lead>, contacts: &[Contact]) -> Vec<EnrichedLead> {
    leads
        .into_iter()
        .map(|mut lead| {
            let resolved: Vec<Option<Contact>> = lead
                .contact_refs()
                .iter()
                .map(|reference| {
                    let Some(id) = reference.contact_id() else {
                        tracing::warn!(
                            "Lead {} has a contact reference without a usable id: {}",
                            lead.id,
                            reference.id
                        );
                        return None;
                    };
                    let found = contacts.iter().find(|c| c.id == id).cloned();
                    if found.is_none() {
                        // Kept as a null entry until product decides how to surface it.
                        tracing::warn!(
                            "Lead {} references contact {} missing from the batch response",
                            lead.id,
                            id
                        );
                    }
                    found
                })
                .collect();

            lead.fields.remove("contacts");
            EnrichedLead {
                lead,
                contacts: resolved,
            }
        })
        .collect()
}
