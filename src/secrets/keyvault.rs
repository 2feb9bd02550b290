//! Two-tier envelope-encryption key hierarchy.
//!
//! Master keys are provisioned from the environment, generated on first
//! boot, or minted by an admin. Bring-your-own keys (environment-supplied)
//! never have their raw material written to [`Store`] — only metadata (id,
//! name, primary flag). Auto-generated and admin-registered keys persist
//! their 32-byte `key_material` on the row, since nothing else could recover
//! them after a restart. Each tenant gets a per-tenant data-encryption key
//! (the `TenantKey`), itself wrapped under the current primary master key.
//! Individual secrets are wrapped under the tenant key. Compromising one
//! tenant's key never exposes another tenant's secrets, and rotating the
//! master key only requires re-wrapping tenant keys, not every secret.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::store::{MasterKey, Store, TenantKey};

use super::crypto::{decode_key, decode_token, encode_key, encode_token, FernetKey};
use super::error::{Result, SecretsError};

/// Default number of master keys to generate when none are provisioned and
/// the store has no existing master key metadata.
pub const DEFAULT_KEY_COUNT: usize = 3;

pub struct KeyVault {
    /// Raw key material keyed by `MasterKey::id`, held only in memory.
    material: RwLock<HashMap<Uuid, [u8; 32]>>,
}

impl KeyVault {
    /// Bootstraps the vault: reconciles named key material (from
    /// `REACTORCIDE_MASTER_KEYS`, first entry primary) with the store's
    /// master key metadata, creating metadata rows on first boot.
    ///
    /// Auto-generated keys (no env material supplied at all) persist their
    /// `key_material` on the row so they survive a restart; bring-your-own
    /// keys never have `key_material` written, per spec.md §4.3. On
    /// reconciliation, a row that carries its own `key_material` is
    /// rehydrated straight from the store before falling back to requiring
    /// env-supplied material.
    pub fn bootstrap(store: &Store, provided: Vec<(String, [u8; 32])>) -> Result<Self> {
        let existing = store.list_master_keys()?;

        if existing.is_empty() {
            let (provided, auto_generated) = if provided.is_empty() {
                let generated: Vec<(String, [u8; 32])> =
                    (0..DEFAULT_KEY_COUNT).map(|i| (format!("master-{i}"), FernetKey::generate())).collect();
                (generated, true)
            } else {
                (provided, false)
            };

            let mut material = HashMap::new();
            for (ordinal, (name, key)) in provided.into_iter().enumerate() {
                let row = MasterKey {
                    id: Uuid::now_v7(),
                    name,
                    description: String::new(),
                    ordinal: ordinal as u32,
                    is_primary: ordinal == 0,
                    key_material: if auto_generated { Some(key) } else { None },
                    created_at: Utc::now(),
                    retired_at: None,
                };
                store.create_master_key(&row)?;
                material.insert(row.id, key);
            }
            return Ok(Self { material: RwLock::new(material) });
        }

        let by_name: HashMap<&str, [u8; 32]> =
            provided.iter().map(|(n, k)| (n.as_str(), *k)).collect();
        let mut material = HashMap::new();
        for row in &existing {
            if let Some(stored) = row.key_material {
                // Auto-generated/registered key: persisted material survives
                // a restart without needing env supply.
                material.insert(row.id, stored);
                continue;
            }
            if row.is_active() {
                let key = by_name.get(row.name.as_str()).copied().ok_or_else(|| {
                    SecretsError::InvalidIdentifier(format!(
                        "no key material supplied for active master key {:?}",
                        row.name
                    ))
                })?;
                material.insert(row.id, key);
            } else if let Some(key) = by_name.get(row.name.as_str()) {
                // Retired keys are optional but accepted if still supplied,
                // so in-flight decrypts under a just-decommissioned key still work.
                material.insert(row.id, *key);
            }
        }
        Ok(Self { material: RwLock::new(material) })
    }

    fn primary(&self, store: &Store) -> Result<(MasterKey, FernetKey)> {
        let keys = store.list_master_keys()?;
        let primary = keys
            .into_iter()
            .find(|k| k.is_primary)
            .ok_or(SecretsError::NoActiveMasterKey)?;
        let material = self
            .material
            .read()
            .unwrap()
            .get(&primary.id)
            .copied()
            .ok_or(SecretsError::NoActiveMasterKey)?;
        Ok((primary, FernetKey::from_bytes(&material)))
    }

    fn material_for(&self, keys: &[MasterKey], master_key_id: Uuid) -> Result<FernetKey> {
        let row = keys
            .iter()
            .find(|k| k.id == master_key_id)
            .ok_or(SecretsError::NoActiveMasterKey)?;
        let material = self
            .material
            .read()
            .unwrap()
            .get(&row.id)
            .copied()
            .ok_or(SecretsError::NoActiveMasterKey)?;
        Ok(FernetKey::from_bytes(&material))
    }

    /// Returns the tenant's raw data-encryption key, creating and wrapping a
    /// fresh one under the current primary master key if none exists yet.
    pub fn tenant_key(&self, store: &Store, tenant_user_id: Uuid) -> Result<[u8; 32]> {
        let (primary_row, primary_cipher) = self.primary(store)?;

        let existing = store.get_tenant_keys(tenant_user_id)?;
        if let Some(row) = existing.iter().find(|k| k.master_key_id == primary_row.id) {
            let token = decode_token(&row.wrapped_key)?;
            let raw = primary_cipher.decrypt(&token)?;
            return decode_key(std::str::from_utf8(&raw).map_err(|_| SecretsError::AuthenticationFailure)?);
        }

        // Tenant has keys wrapped under a retired master key, or none at all.
        // Try every other known master key before minting a brand new DEK.
        let all_keys = store.list_master_keys()?;
        for row in &existing {
            if let Ok(cipher) = self.material_for(&all_keys, row.master_key_id) {
                if let Ok(token) = decode_token(&row.wrapped_key) {
                    if let Ok(raw) = cipher.decrypt(&token) {
                        if let Ok(s) = std::str::from_utf8(&raw) {
                            if let Ok(dek) = decode_key(s) {
                                self.rewrap_one(store, &primary_row, &primary_cipher, tenant_user_id, dek)?;
                                return Ok(dek);
                            }
                        }
                    }
                }
            }
        }

        let dek = FernetKey::generate();
        self.rewrap_one(store, &primary_row, &primary_cipher, tenant_user_id, dek)?;
        Ok(dek)
    }

    fn rewrap_one(
        &self,
        store: &Store,
        primary_row: &MasterKey,
        primary_cipher: &FernetKey,
        tenant_user_id: Uuid,
        dek: [u8; 32],
    ) -> Result<()> {
        let wrapped = encode_token(&primary_cipher.encrypt(encode_key(&dek).as_bytes()));
        let row = TenantKey {
            id: Uuid::now_v7(),
            tenant_user_id,
            master_key_id: primary_row.id,
            wrapped_key: wrapped,
            created_at: Utc::now(),
        };
        store.upsert_tenant_key(&row)
    }

    /// Re-wraps every tenant key under the current primary master key.
    /// Used after a master key rotation; leaves unrelated tenant rows alone.
    pub fn rewrap_tenant_keys(&self, store: &Store, tenant_user_id: Uuid) -> Result<()> {
        let (primary_row, primary_cipher) = self.primary(store)?;
        let existing = store.get_tenant_keys(tenant_user_id)?;
        let keys = store.list_master_keys()?;

        for row in existing {
            if row.master_key_id == primary_row.id {
                continue;
            }
            let old_cipher = self.material_for(&keys, row.master_key_id)?;
            let token = decode_token(&row.wrapped_key)?;
            let raw = old_cipher.decrypt(&token)?;

            let rewrapped = TenantKey {
                id: row.id,
                tenant_user_id,
                master_key_id: primary_row.id,
                wrapped_key: encode_token(&primary_cipher.encrypt(&raw)),
                created_at: row.created_at,
            };
            store.upsert_tenant_key(&rewrapped)?;
        }
        Ok(())
    }

    /// Registers a brand-new master key: generates 32 bytes of key material
    /// with a CSPRNG, persists its metadata row (including `key_material`, so
    /// it survives a restart) as non-primary, and caches the material in
    /// memory for this process's lifetime. Used by the admin "create master
    /// key" endpoint; the key becomes usable for encryption only once
    /// [`KeyVault::rotate_to`] promotes it to primary.
    pub fn register(&self, store: &Store, name: &str, description: &str) -> Result<MasterKey> {
        if store.get_master_key_by_name(name)?.is_some() {
            return Err(SecretsError::InvalidIdentifier(format!("master key {name:?} already exists")));
        }
        let key = FernetKey::generate();
        let row = MasterKey {
            id: Uuid::now_v7(),
            name: name.to_string(),
            description: description.to_string(),
            ordinal: store.list_master_keys()?.len() as u32,
            is_primary: false,
            key_material: Some(key),
            created_at: Utc::now(),
            retired_at: None,
        };
        store.create_master_key(&row)?;
        self.material.write().unwrap().insert(row.id, key);
        Ok(row)
    }

    /// Promotes an already-registered master key to primary: re-wraps every
    /// tenant's data-encryption key under it, then atomically flips
    /// `is_primary`. Steps 2-4 of the rotation procedure in `SPEC_FULL.md`
    /// §4.3; step 1 (registering the key) is [`KeyVault::register`], and for
    /// bring-your-own key material, restarting the process with the new
    /// entry in `REACTORCIDE_MASTER_KEYS` achieves the same registration.
    pub fn rotate_to(&self, store: &Store, name: &str) -> Result<()> {
        let row = store
            .get_master_key_by_name(name)?
            .ok_or_else(|| SecretsError::InvalidIdentifier(format!("no such master key: {name:?}")))?;
        if !row.is_active() {
            return Err(SecretsError::InvalidIdentifier(format!("master key {name:?} is retired")));
        }
        if !self.material.read().unwrap().contains_key(&row.id) {
            return Err(SecretsError::InvalidIdentifier(format!(
                "no key material available in memory for {name:?} \
                 (this requires restarting the vault with the key present in REACTORCIDE_MASTER_KEYS)"
            )));
        }

        for tenant_id in store.list_all_tenant_ids()? {
            self.rewrap_under(store, &row, tenant_id)?;
        }
        store.set_primary_master_key(row.id)?;
        Ok(())
    }

    fn rewrap_under(&self, store: &Store, target: &MasterKey, tenant_user_id: Uuid) -> Result<()> {
        let material = self.material.read().unwrap();
        let target_material = *material.get(&target.id).ok_or(SecretsError::NoActiveMasterKey)?;
        let target_cipher = FernetKey::from_bytes(&target_material);
        drop(material);

        if store
            .get_tenant_keys(tenant_user_id)?
            .iter()
            .any(|k| k.master_key_id == target.id)
        {
            return Ok(());
        }

        let dek = self.tenant_key(store, tenant_user_id)?;
        let wrapped = encode_token(&target_cipher.encrypt(encode_key(&dek).as_bytes()));
        store.upsert_tenant_key(&TenantKey {
            id: Uuid::now_v7(),
            tenant_user_id,
            master_key_id: target.id,
            wrapped_key: wrapped,
            created_at: Utc::now(),
        })
    }

    /// Marks a master key inactive and removes every `TenantKey` wrapped
    /// under it. Refuses to decommission the current primary key.
    pub fn decommission(&self, store: &Store, name: &str) -> Result<()> {
        let mut row = store
            .get_master_key_by_name(name)?
            .ok_or_else(|| SecretsError::InvalidIdentifier(format!("no such master key: {name:?}")))?;
        if row.is_primary {
            return Err(SecretsError::InvalidIdentifier("cannot decommission the primary master key".into()));
        }
        row.retired_at = Some(Utc::now());
        store.update_master_key(&row)?;
        store.delete_tenant_keys_for_master(row.id)?;
        self.material.write().unwrap().remove(&row.id);
        Ok(())
    }

    /// Re-wraps every known tenant's data-encryption key under the current
    /// primary master key. `rotate_to` already does this as part of
    /// promoting a new primary; this is the standalone operation for
    /// reconciling tenants that drifted (e.g. onboarded while a rotation was
    /// in flight) without changing which key is primary. Returns the number
    /// of tenants touched.
    pub fn sync_all_tenants_to_primary(&self, store: &Store) -> Result<usize> {
        let tenants = store.list_all_tenant_ids()?;
        for &tenant_id in &tenants {
            self.rewrap_tenant_keys(store, tenant_id)?;
        }
        Ok(tenants.len())
    }

    /// Inserts key material directly into the in-memory map. Used by the
    /// admin rotate endpoint's test double and by callers that mint a key
    /// programmatically rather than via the environment.
    pub fn insert_material(&self, master_key_id: Uuid, material: [u8; 32]) {
        self.material.write().unwrap().insert(master_key_id, material);
    }
}
