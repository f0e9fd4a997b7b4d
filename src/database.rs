//! The event database.
//!
//! A database owns the shared event type table, the set of zones, and the
//! bookkeeping that spans them: measurement units, the common timebase and
//! the global event time extents. Sources feed events in through an
//! insertion transaction; when it ends every zone is rebuilt and listeners
//! are notified of the changes.

use crate::event::{EventType, EventTypeTable};
use crate::event::types::builtin_types;
use crate::index::FrameList;
use crate::unit::Unit;
use crate::utils::DatabaseError;
use crate::zone::Zone;
use std::collections::HashMap;
use std::rc::Rc;

/// Notifications emitted by the database as its contents change.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseEvent {
    /// A new source began contributing events.
    SourcesChanged,
    /// A source failed; the database keeps whatever was loaded before.
    SourceError {
        message: String,
        detail: Option<String>,
    },
    /// Zones created by the last insertion transaction, by index.
    ZonesAdded { zone_indices: Vec<usize> },
    /// Event data changed; derived state must be re-read.
    Invalidated,
}

/// Callback invoked for every [`DatabaseEvent`].
pub type Listener = Box<dyn FnMut(&DatabaseEvent)>;

/// Event database. Stores all zones of a trace and drives their rebuilds.
pub struct Database {
    /// Type table shared by every zone's store.
    event_type_table: Rc<EventTypeTable>,
    units: Unit,
    /// Timebase all sources are aligned against. -1 until the first source
    /// registers one.
    common_timebase: f64,
    first_event_time: f64,
    last_event_time: f64,
    zones: Vec<Zone>,
    /// `name:type:location` per zone, for lookup by identity.
    zone_keys: HashMap<String, usize>,
    default_zone: Option<usize>,
    source_count: usize,
    inserting_events: bool,
    /// Zone count at transaction begin, used to detect added zones.
    beginning_zone_count: usize,
    listeners: Vec<Listener>,
}

impl Database {
    pub fn new() -> Self {
        let event_type_table = Rc::new(EventTypeTable::new());
        event_type_table.define_all(builtin_types());
        Self {
            event_type_table,
            units: Unit::default(),
            common_timebase: -1.0,
            first_event_time: 0.0,
            last_event_time: 0.0,
            zones: Vec::new(),
            zone_keys: HashMap::new(),
            default_zone: None,
            source_count: 0,
            inserting_events: false,
            beginning_zone_count: 0,
            listeners: Vec::new(),
        }
    }

    /// Registers a callback invoked for every [`DatabaseEvent`].
    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    fn emit(&mut self, event: DatabaseEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn event_type_table(&self) -> &Rc<EventTypeTable> {
        &self.event_type_table
    }

    /// Looks up the event type for the given event name.
    pub fn get_event_type(&self, name: &str) -> Option<Rc<EventType>> {
        self.event_type_table.get_by_name(name)
    }

    /// The unit of measure of all values in the database.
    pub fn units(&self) -> Unit {
        self.units
    }

    /// The walltime all sources are relative to, or -1 if not yet set.
    pub fn timebase(&self) -> f64 {
        self.common_timebase
    }

    /// Computes a time delay for a source against the shared timebase. The
    /// first timebase seen becomes the shared one.
    pub fn compute_time_delay(&mut self, timebase: f64) -> f64 {
        if self.common_timebase == -1.0 {
            self.common_timebase = timebase;
            0.0
        } else {
            self.common_timebase - timebase
        }
    }

    /// Creates a new zone or gets the existing one with the same identity.
    /// A nameless default zone created earlier is claimed by the first real
    /// zone instead of making a second one.
    pub fn create_or_get_zone(&mut self, name: &str, zone_type: &str, location: &str) -> usize {
        let key = format!("{}:{}:{}", name, zone_type, location);

        if let Some(default_index) = self.default_zone {
            if self.zones[default_index].name().is_empty() {
                self.zones[default_index].reset_info(name, zone_type, location);
                self.zone_keys.insert(key, default_index);
                return default_index;
            }
        }

        match self.zone_keys.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.zones.len();
                self.zones.push(Zone::new(
                    Rc::clone(&self.event_type_table),
                    name,
                    zone_type,
                    location,
                ));
                self.zone_keys.insert(key, index);
                if self.default_zone.is_none() {
                    self.default_zone = Some(index);
                }
                index
            }
        }
    }

    /// Index of the default zone, creating a nameless one if none exists.
    pub fn default_zone_index(&mut self) -> usize {
        match self.default_zone {
            Some(index) => index,
            None => {
                let index = self.zones.len();
                self.zones
                    .push(Zone::new(Rc::clone(&self.event_type_table), "", "", ""));
                self.default_zone = Some(index);
                index
            }
        }
    }

    /// The default zone, creating it if needed.
    pub fn default_zone_mut(&mut self) -> &mut Zone {
        let index = self.default_zone_index();
        &mut self.zones[index]
    }

    /// All zones, in creation order.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_mut(&mut self, index: usize) -> Option<&mut Zone> {
        self.zones.get_mut(index)
    }

    /// The first frame list containing any frames from any zone.
    pub fn get_first_frame_list(&self) -> Option<&FrameList> {
        self.zones
            .iter()
            .map(|zone| zone.frame_list())
            .find(|frames| frames.count() > 0)
    }

    /// Total number of user-visible events across all zones.
    pub fn get_total_event_count(&self) -> usize {
        self.zones
            .iter()
            .map(|zone| zone.store().total_event_count())
            .sum()
    }

    /// Time of the first event, or 0 if no events.
    pub fn first_event_time(&self) -> f64 {
        self.first_event_time
    }

    /// End time of the last event, or 0 if no events.
    pub fn last_event_time(&self) -> f64 {
        self.last_event_time
    }

    /// Opens an insertion transaction for a source measuring in `units`.
    ///
    /// The first source decides the database units; later sources must
    /// agree or their load is rejected before any of their events land.
    pub fn begin_inserting_events(&mut self, units: Unit) -> Result<(), DatabaseError> {
        if self.inserting_events {
            return Err(DatabaseError::AlreadyInserting);
        }

        self.source_count += 1;
        self.emit(DatabaseEvent::SourcesChanged);
        if self.source_count == 1 {
            self.units = units;
        } else if self.units != units {
            self.emit(DatabaseEvent::SourceError {
                message: "Mixing measurement units is not supported.".to_string(),
                detail: Some(
                    "All sources loaded must be of the same type (time/size).".to_string(),
                ),
            });
            return Err(DatabaseError::UnitMismatch);
        }

        self.inserting_events = true;
        self.beginning_zone_count = self.zones.len();
        if self.zones.len() == 1 && self.zones[0].name().is_empty() {
            // The nameless default zone does not count as pre-existing; it
            // will be claimed by the first zone the source announces.
            self.beginning_zone_count = 0;
        }
        Ok(())
    }

    /// Ends an insertion transaction: rebuilds every zone, refreshes the
    /// global time extents and notifies listeners.
    pub fn end_inserting_events(&mut self) -> Result<(), DatabaseError> {
        if !self.inserting_events {
            return Err(DatabaseError::NotInserting);
        }
        self.inserting_events = false;

        self.first_event_time = f64::MAX;
        self.last_event_time = f64::MIN;
        for zone in &mut self.zones {
            zone.rebuild();
            let store = zone.store();
            self.first_event_time = self.first_event_time.min(store.first_event_time());
            self.last_event_time = self.last_event_time.max(store.last_event_time());
        }
        if self.first_event_time == f64::MAX {
            self.first_event_time = 0.0;
            self.last_event_time = 0.0;
        }

        if self.beginning_zone_count != self.zones.len() {
            let zone_indices = (self.beginning_zone_count..self.zones.len()).collect();
            self.emit(DatabaseEvent::ZonesAdded { zone_indices });
        }

        self.emit(DatabaseEvent::Invalidated);
        Ok(())
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
