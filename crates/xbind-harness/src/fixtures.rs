#![forbid(unsafe_code)]

//! Reference sources, targets, and compiled tables.
//!
//! The tables here are what the markup compiler would emit for
//!
//! ```text
//! <TextBlock x:Name="NameText" Text="{x:Bind Name}"/>
//! <TextBlock x:Name="AgeText"  Text="{x:Bind Age}"          x:Phase="1"/>
//! <TextBlock x:Name="CityText" Text="{x:Bind Address.City}" x:Phase="2"/>
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use xbind_runtime::{
    BindingConfig, BindingTable, Bindings, ByRef, ConnectionId, Inspectable, Notifier, Notifying,
    NotifyKinds, Observer, SlotDef, SlotId, VectorAction,
};

use crate::virtual_list::Container;

pub const NAME_TEXT: ConnectionId = ConnectionId(1);
pub const AGE_TEXT: ConnectionId = ConnectionId(2);
pub const CITY_TEXT: ConnectionId = ConnectionId(3);

pub const NAME_SLOT: SlotId = SlotId(0);
pub const AGE_SLOT: SlotId = SlotId(1);
pub const CITY_SLOT: SlotId = SlotId(2);

/// A notifying person with a nested, replaceable address.
pub struct Person {
    name: RefCell<String>,
    age: Cell<u32>,
    address: RefCell<Option<Rc<Address>>>,
    notifier: Notifier,
}

impl Person {
    #[must_use]
    pub fn new(name: &str, age: u32) -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(name.to_owned()),
            age: Cell::new(age),
            address: RefCell::new(None),
            notifier: Notifier::new(),
        })
    }

    #[must_use]
    pub fn with_address(name: &str, age: u32, city: &str) -> Rc<Self> {
        let person = Self::new(name, age);
        *person.address.borrow_mut() = Some(Address::new(city));
        person
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_owned();
        self.notifier.property_changed("Name");
    }

    #[must_use]
    pub fn age(&self) -> u32 {
        self.age.get()
    }

    pub fn set_age(&self, age: u32) {
        self.age.set(age);
        self.notifier.property_changed("Age");
    }

    #[must_use]
    pub fn address(&self) -> Option<Rc<Address>> {
        self.address.borrow().clone()
    }

    pub fn set_address(&self, address: Option<Rc<Address>>) {
        *self.address.borrow_mut() = address;
        self.notifier.property_changed("Address");
    }

    /// Replace the address without announcing it.
    pub fn set_address_untracked(&self, address: Option<Rc<Address>>) {
        *self.address.borrow_mut() = address;
    }
}

impl Notifying for Person {
    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

pub struct Address {
    city: RefCell<String>,
    notifier: Notifier,
}

impl Address {
    #[must_use]
    pub fn new(city: &str) -> Rc<Self> {
        Rc::new(Self {
            city: RefCell::new(city.to_owned()),
            notifier: Notifier::new(),
        })
    }

    #[must_use]
    pub fn city(&self) -> String {
        self.city.borrow().clone()
    }

    pub fn set_city(&self, city: &str) {
        *self.city.borrow_mut() = city.to_owned();
        self.notifier.property_changed("City");
    }
}

impl Notifying for Address {
    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

/// An observable vector of strings.
#[derive(Default)]
pub struct Playlist {
    tracks: RefCell<Vec<String>>,
    notifier: Notifier,
}

impl Playlist {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn push(&self, track: &str) {
        let index = {
            let mut tracks = self.tracks.borrow_mut();
            tracks.push(track.to_owned());
            tracks.len() - 1
        };
        self.notifier
            .vector_changed(VectorAction::ItemInserted, u32::try_from(index).unwrap_or(u32::MAX));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.borrow().is_empty()
    }
}

impl Notifying for Playlist {
    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

/// Text target that counts its writes.
#[derive(Debug, Default)]
pub struct TextBlock {
    text: RefCell<String>,
    writes: Cell<usize>,
}

impl TextBlock {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn set_text(&self, text: &str) {
        *self.text.borrow_mut() = text.to_owned();
        self.writes.set(self.writes.get() + 1);
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

/// Table of the three-field person row: name (phase 0), age (phase 1), and
/// `Address.City` (phase 2).
///
/// # Panics
///
/// Never in practice; the table is statically well formed.
#[must_use]
pub fn person_row_table() -> Rc<BindingTable<ByRef<Person>>> {
    let write = |block: &TextBlock, text: &String| block.set_text(text);
    BindingTable::<ByRef<Person>>::builder("PersonRow")
        .connection::<TextBlock>(NAME_TEXT, "NameText")
        .connection::<TextBlock>(AGE_TEXT, "AgeText")
        .connection::<TextBlock>(CITY_TEXT, "CityText")
        .slot(
            SlotDef::new(NAME_SLOT, NAME_TEXT).tracks(NotifyKinds::PROPERTY_CHANGED),
            |person: &Rc<Person>, cx: &mut Observer| {
                cx.property(person, "Name");
                Some(person.name())
            },
            write,
        )
        .slot(
            SlotDef::new(AGE_SLOT, AGE_TEXT)
                .phase(1)
                .tracks(NotifyKinds::PROPERTY_CHANGED),
            |person: &Rc<Person>, cx: &mut Observer| {
                cx.property(person, "Age");
                Some(person.age().to_string())
            },
            write,
        )
        .slot(
            SlotDef::new(CITY_SLOT, CITY_TEXT)
                .phase(2)
                .tracks(NotifyKinds::PROPERTY_CHANGED),
            |person: &Rc<Person>, cx: &mut Observer| {
                cx.property(person, "Address");
                let Some(address) = person.address() else {
                    return Some(String::new());
                };
                cx.property(&address, "City");
                Some(address.city())
            },
            write,
        )
        .build()
        .unwrap_or_else(|err| panic!("fixture table: {err}"))
}

/// Single-slot table counting the tracks of a playlist.
///
/// # Panics
///
/// Never in practice; the table is statically well formed.
#[must_use]
pub fn playlist_table() -> Rc<BindingTable<ByRef<Playlist>>> {
    BindingTable::<ByRef<Playlist>>::builder("PlaylistHeader")
        .connection::<TextBlock>(ConnectionId(1), "CountText")
        .slot(
            SlotDef::new(SlotId(0), ConnectionId(1)).tracks(NotifyKinds::VECTOR_CHANGED),
            |playlist: &Rc<Playlist>, cx: &mut Observer| {
                cx.vector(playlist);
                Some(playlist.len())
            },
            |block: &TextBlock, count: &usize| block.set_text(&format!("{count} tracks")),
        )
        .build()
        .unwrap_or_else(|err| panic!("fixture table: {err}"))
}

/// Targets of one realized person row.
#[derive(Clone, Debug)]
pub struct RowTargets {
    pub name: Rc<TextBlock>,
    pub age: Rc<TextBlock>,
    pub city: Rc<TextBlock>,
}

impl RowTargets {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: TextBlock::new(),
            age: TextBlock::new(),
            city: TextBlock::new(),
        }
    }

    /// Connect every target; a rejected connection is fatal.
    ///
    /// # Panics
    ///
    /// If the table does not declare the person-row connections.
    pub fn connect(&self, bindings: &dyn Bindings) {
        for (id, target) in [
            (NAME_TEXT, &self.name),
            (AGE_TEXT, &self.age),
            (CITY_TEXT, &self.city),
        ] {
            if let Err(err) = bindings.connect(id, Rc::clone(target) as Inspectable) {
                panic!("harness: {err}");
            }
        }
    }

    /// Total writes over all targets.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.name.writes() + self.age.writes() + self.city.writes()
    }
}

impl Default for RowTargets {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a connected person-row container from `table`.
#[must_use]
pub fn person_row(table: &Rc<BindingTable<ByRef<Person>>>, config: BindingConfig) -> Container<RowTargets> {
    let bindings = table.create_with(config);
    let targets = RowTargets::new();
    targets.connect(&bindings);
    Container::new(Box::new(bindings), targets)
}
