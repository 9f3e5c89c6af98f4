use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DefaultTieBreak;
use crate::domain::address::{Address, AddressDraft, AddressId, AddressPatch, AddressType};
use crate::errors::AddressError;
use crate::notify::{ChangeSink, NoopChangeSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressChangeKind {
    Added,
    Updated,
    Removed,
    DefaultSet,
    Replaced,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBookChange {
    pub kind: AddressChangeKind,
    pub address_id: Option<AddressId>,
    pub addresses: Vec<Address>,
}

/// Owns a person's addresses and keeps exactly one of them flagged as default.
pub struct AddressBook<S = NoopChangeSink> {
    addresses: Vec<Address>,
    tie_break: DefaultTieBreak,
    sink: S,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::with_sink(DefaultTieBreak::default(), NoopChangeSink)
    }
}

impl Default for AddressBook {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> AddressBook<S>
where
    S: ChangeSink<AddressBookChange>,
{
    pub fn with_sink(tie_break: DefaultTieBreak, sink: S) -> Self {
        Self { addresses: Vec::new(), tie_break, sink }
    }

    /// Rebuilds a book from stored records. Repairs default flags but publishes nothing.
    pub fn restore(
        addresses: Vec<Address>,
        tie_break: DefaultTieBreak,
        sink: S,
    ) -> Result<Self, AddressError> {
        check_records(&addresses)?;
        let mut book = Self::with_sink(tie_break, sink);
        book.addresses = addresses;
        book.validate_invariant();
        Ok(book)
    }

    pub fn add(&mut self, draft: AddressDraft) -> Result<Address, AddressError> {
        let mut address = Address::from_draft(AddressId::generate(), draft);
        validate(&address)?;

        if address.is_default || self.addresses.is_empty() {
            self.clear_defaults();
            address.is_default = true;
        }

        self.addresses.push(address.clone());
        info!(
            event_name = "address.added",
            address_id = %address.id,
            address_type = address.address_type.as_str(),
            is_default = address.is_default,
            "address added"
        );
        self.publish(AddressChangeKind::Added, Some(address.id.clone()));
        Ok(address)
    }

    pub fn update(&mut self, id: &AddressId, patch: AddressPatch) -> Result<Address, AddressError> {
        let index = self.position(id).ok_or_else(|| AddressError::NotFound(id.clone()))?;
        let merged = self.addresses[index].merged(&patch);
        validate(&merged)?;

        if patch.is_default == Some(true) {
            self.clear_defaults();
        }
        self.addresses[index] = merged;
        if patch.is_default == Some(false) {
            self.repair_invariant();
        }

        let updated = self.addresses[index].clone();
        info!(
            event_name = "address.updated",
            address_id = %updated.id,
            is_default = updated.is_default,
            "address updated"
        );
        self.publish(AddressChangeKind::Updated, Some(updated.id.clone()));
        Ok(updated)
    }

    /// Removes the address; returns `false` when `id` is unknown. Confirmation is the
    /// caller's responsibility.
    pub fn remove(&mut self, id: &AddressId) -> bool {
        let Some(index) = self.position(id) else {
            debug!(event_name = "address.remove_missed", address_id = %id, "no such address");
            return false;
        };

        let removed = self.addresses.remove(index);
        if removed.is_default {
            if let Some(first) = self.addresses.first_mut() {
                first.is_default = true;
            }
        }

        info!(
            event_name = "address.removed",
            address_id = %removed.id,
            was_default = removed.is_default,
            remaining = self.addresses.len(),
            "address removed"
        );
        self.publish(AddressChangeKind::Removed, Some(removed.id));
        true
    }

    pub fn set_default(&mut self, id: &AddressId) -> Result<(), AddressError> {
        let index = self.position(id).ok_or_else(|| AddressError::NotFound(id.clone()))?;

        self.clear_defaults();
        self.addresses[index].is_default = true;

        info!(event_name = "address.default_set", address_id = %id, "default address changed");
        self.publish(AddressChangeKind::DefaultSet, Some(id.clone()));
        Ok(())
    }

    /// Replaces the whole collection with externally supplied records, then restores
    /// the default invariant. Nothing changes when any record is invalid or an id repeats.
    pub fn replace_all(&mut self, addresses: Vec<Address>) -> Result<(), AddressError> {
        check_records(&addresses)?;
        self.addresses = addresses;
        self.validate_invariant();
        info!(
            event_name = "address.replaced",
            count = self.addresses.len(),
            "address book replaced"
        );
        self.publish(AddressChangeKind::Replaced, None);
        Ok(())
    }

    pub fn all(&self) -> Vec<Address> {
        self.addresses.clone()
    }

    pub fn into_addresses(self) -> Vec<Address> {
        self.addresses
    }

    pub fn get(&self, id: &AddressId) -> Option<Address> {
        self.addresses.iter().find(|address| &address.id == id).cloned()
    }

    pub fn by_type(&self, address_type: AddressType) -> Vec<Address> {
        self.addresses
            .iter()
            .filter(|address| address.address_type == address_type)
            .cloned()
            .collect()
    }

    pub fn default_address(&self) -> Option<Address> {
        self.addresses.iter().find(|address| address.is_default).cloned()
    }

    pub fn has_any(&self) -> bool {
        !self.addresses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn tie_break(&self) -> DefaultTieBreak {
        self.tie_break
    }

    fn validate_invariant(&mut self) {
        let defaults: Vec<usize> = self
            .addresses
            .iter()
            .enumerate()
            .filter(|(_, address)| address.is_default)
            .map(|(index, _)| index)
            .collect();

        let keep = match (defaults.as_slice(), self.tie_break) {
            ([], _) => {
                if self.addresses.is_empty() {
                    return;
                }
                0
            }
            ([_], _) => return,
            ([first, ..], DefaultTieBreak::First) => *first,
            ([.., last], DefaultTieBreak::Last) => *last,
        };

        warn!(
            event_name = "address.invariant_repaired",
            defaults_found = defaults.len(),
            kept_address_id = %self.addresses[keep].id,
            "address default flags repaired"
        );
        for (index, address) in self.addresses.iter_mut().enumerate() {
            address.is_default = index == keep;
        }
    }

    fn repair_invariant(&mut self) {
        if !self.addresses.iter().any(|address| address.is_default) {
            if let Some(first) = self.addresses.first_mut() {
                first.is_default = true;
            }
        }
    }

    fn clear_defaults(&mut self) {
        for address in &mut self.addresses {
            address.is_default = false;
        }
    }

    fn position(&self, id: &AddressId) -> Option<usize> {
        self.addresses.iter().position(|address| &address.id == id)
    }

    fn publish(&self, kind: AddressChangeKind, address_id: Option<AddressId>) {
        self.sink.publish(AddressBookChange { kind, address_id, addresses: self.addresses.clone() });
    }
}

fn validate(address: &Address) -> Result<(), AddressError> {
    address
        .validate_fields()
        .map_err(|(field, message)| AddressError::Validation { field, message })
}

fn check_records(addresses: &[Address]) -> Result<(), AddressError> {
    let mut seen = HashSet::with_capacity(addresses.len());
    for address in addresses {
        validate(address)?;
        if !seen.insert(&address.id) {
            return Err(AddressError::DuplicateId(address.id.clone()));
        }
    }
    Ok(())
}
