//! Key-per-value persistence for bill state
//!
//! Each piece of state lives under its own named key, written whenever the
//! corresponding value changes and read once at startup to rehydrate.
//! Writes go through a temp file in the same directory so a crash never
//! leaves a half-written value; a corrupt value falls back to its default
//! rather than poisoning startup.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::bill::BillState;
use crate::error::{Error, Result};

const KEY_ITEMS: &str = "items";
const KEY_BILL_IMAGE: &str = "billImage";
const KEY_BILL_TEXT: &str = "billText";
const KEY_TIP_ALLOCATIONS: &str = "tipAllocations";
const KEY_USER_COLORS: &str = "userColors";
const KEY_ACTIVE_COLOR: &str = "activeColor";
const KEY_NUM_PERSONS: &str = "numPersons";
const KEY_SPLIT_CHARGES_EVENLY: &str = "splitChargesEvenly";
const KEY_SPLIT_TIP_EVENLY: &str = "splitTipEvenly";

pub struct BillStore {
    root: PathBuf,
}

impl BillStore {
    /// Open a store rooted at the given directory, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Default store location under the platform data directory
    pub fn default_path() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|d| d.join("tally").join("state"))
            .ok_or_else(|| Error::Store("no platform data directory".to_string()))
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn write_key<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let file = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer(file.as_file(), value)?;
        file.persist(self.key_path(key))
            .map_err(|e| Error::Store(format!("persisting {key}: {e}")))?;
        debug!(key, "wrote state key");
        Ok(())
    }

    fn read_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, error = %err, "discarding corrupt state key");
                Ok(None)
            }
        }
    }

    pub fn save_items(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_ITEMS, &state.items)
    }

    pub fn save_bill_image(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_BILL_IMAGE, &state.bill_image)
    }

    pub fn save_bill_text(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_BILL_TEXT, &state.bill_text)
    }

    pub fn save_tip_allocations(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_TIP_ALLOCATIONS, &state.tip_allocations)
    }

    pub fn save_user_colors(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_USER_COLORS, &state.user_colors)
    }

    pub fn save_active_color(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_ACTIVE_COLOR, &state.active_color)
    }

    pub fn save_num_persons(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_NUM_PERSONS, &state.num_persons)
    }

    pub fn save_split_charges_evenly(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_SPLIT_CHARGES_EVENLY, &state.split_charges_evenly)
    }

    pub fn save_split_tip_evenly(&self, state: &BillState) -> Result<()> {
        self.write_key(KEY_SPLIT_TIP_EVENLY, &state.split_tip_evenly)
    }

    /// Write every persisted key
    pub fn save(&self, state: &BillState) -> Result<()> {
        self.save_items(state)?;
        self.save_bill_image(state)?;
        self.save_bill_text(state)?;
        self.save_tip_allocations(state)?;
        self.save_user_colors(state)?;
        self.save_active_color(state)?;
        self.save_num_persons(state)?;
        self.save_split_charges_evenly(state)?;
        self.save_split_tip_evenly(state)
    }

    /// Rehydrate state from disk; missing or corrupt keys keep defaults
    pub fn load(&self) -> Result<BillState> {
        let mut state = BillState::new();
        if let Some(items) = self.read_key(KEY_ITEMS)? {
            state.items = items;
        }
        if let Some(image) = self.read_key(KEY_BILL_IMAGE)? {
            state.bill_image = image;
        }
        if let Some(text) = self.read_key(KEY_BILL_TEXT)? {
            state.bill_text = text;
        }
        if let Some(tips) = self.read_key(KEY_TIP_ALLOCATIONS)? {
            state.tip_allocations = tips;
        }
        if let Some(colors) = self.read_key(KEY_USER_COLORS)? {
            state.user_colors = colors;
        }
        if let Some(active) = self.read_key(KEY_ACTIVE_COLOR)? {
            state.active_color = active;
        }
        if let Some(persons) = self.read_key(KEY_NUM_PERSONS)? {
            state.num_persons = persons;
        }
        if let Some(split) = self.read_key(KEY_SPLIT_CHARGES_EVENLY)? {
            state.split_charges_evenly = split;
        }
        if let Some(split) = self.read_key(KEY_SPLIT_TIP_EVENLY)? {
            state.split_tip_evenly = split;
        }
        Ok(state)
    }

    /// Remove every persisted key
    pub fn clear(&self) -> Result<()> {
        for key in [
            KEY_ITEMS,
            KEY_BILL_IMAGE,
            KEY_BILL_TEXT,
            KEY_TIP_ALLOCATIONS,
            KEY_USER_COLORS,
            KEY_ACTIVE_COLOR,
            KEY_NUM_PERSONS,
            KEY_SPLIT_CHARGES_EVENLY,
            KEY_SPLIT_TIP_EVENLY,
        ] {
            let path = self.key_path(key);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
