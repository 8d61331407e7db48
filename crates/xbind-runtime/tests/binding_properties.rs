#![forbid(unsafe_code)]

//! Property tests: random lifecycle sequences against one binding object.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use xbind_runtime::{
    BindingConfig, BindingObject, BindingTable, ByRef, ConnectionId, Inspectable, NextPhase,
    Notifier, Notifying, NotifyKinds, Observer, PhaseState, SlotDef, SlotId,
};

struct Item {
    title: RefCell<String>,
    rank: Cell<u32>,
    notifier: Notifier,
}

impl Item {
    fn new(title: &str) -> Rc<Self> {
        Rc::new(Self {
            title: RefCell::new(title.to_owned()),
            rank: Cell::new(0),
            notifier: Notifier::new(),
        })
    }

    fn touch(&self) {
        self.rank.set(self.rank.get() + 1);
        self.title.borrow_mut().push('*');
        self.notifier.property_changed("Title");
        self.notifier.property_changed("Rank");
    }
}

impl Notifying for Item {
    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

type Hook = Box<dyn FnOnce()>;

#[derive(Default)]
struct Cell2 {
    value: RefCell<String>,
    /// Runs once, on the next write.
    on_write: RefCell<Option<Hook>>,
}

impl Cell2 {
    fn set(&self, value: &str) {
        *self.value.borrow_mut() = value.to_owned();
        let hook = self.on_write.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn value(&self) -> String {
        self.value.borrow().clone()
    }
}

type Row = BindingObject<ByRef<Item>>;

fn table() -> Rc<BindingTable<ByRef<Item>>> {
    let text = |cell: &Cell2, value: &String| cell.set(value);
    BindingTable::<ByRef<Item>>::builder("ItemRow")
        .connection::<Cell2>(ConnectionId(1), "Title")
        .connection::<Cell2>(ConnectionId(2), "Rank")
        .connection::<Cell2>(ConnectionId(3), "Both")
        .slot(
            SlotDef::new(SlotId(0), ConnectionId(1)).tracks(NotifyKinds::PROPERTY_CHANGED),
            |item: &Rc<Item>, cx: &mut Observer| {
                cx.property(item, "Title");
                Some(item.title.borrow().clone())
            },
            text,
        )
        .slot(
            SlotDef::new(SlotId(1), ConnectionId(2)).phase(1),
            |item: &Rc<Item>, cx: &mut Observer| {
                cx.property(item, "Rank");
                Some(item.rank.get().to_string())
            },
            text,
        )
        .slot(
            SlotDef::new(SlotId(2), ConnectionId(3)).phase(3),
            |item: &Rc<Item>, cx: &mut Observer| {
                cx.property(item, "Title").property(item, "Rank");
                Some(format!("{}#{}", item.title.borrow(), item.rank.get()))
            },
            text,
        )
        .build()
        .unwrap()
}

#[derive(Clone, Debug)]
enum Op {
    SetRoot(usize),
    Update,
    Process(usize, u32),
    Touch(usize),
    Recycle,
    Invalidate,
    Stop,
    /// `stop_tracking` then `initialize` with the root left in place.
    Restart,
    /// Set root `.0` and update; the title write swaps to `.1` then `.2`.
    SwapDuringWrite(usize, usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3_usize).prop_map(Op::SetRoot),
        Just(Op::Update),
        (0..3_usize, prop::sample::select(vec![0_u32, 1, 3])).prop_map(|(i, p)| Op::Process(i, p)),
        (0..3_usize).prop_map(Op::Touch),
        Just(Op::Recycle),
        Just(Op::Invalidate),
        Just(Op::Stop),
        Just(Op::Restart),
        (0..3_usize, 0..3_usize, 0..3_usize).prop_map(|(i, j, k)| Op::SwapDuringWrite(i, j, k)),
    ]
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connected row plus its title target.
fn connected() -> (Rc<Row>, Rc<Cell2>) {
    let row = Rc::new(table().create_with(BindingConfig::default()));
    let title = Rc::new(Cell2::default());
    row.connect(ConnectionId(1), Rc::clone(&title) as Inspectable)
        .unwrap();
    for id in 2..=3 {
        row.connect(ConnectionId(id), Rc::new(Cell2::default()) as Inspectable)
            .unwrap();
    }
    (row, title)
}

fn swap_on_write(row: &Rc<Row>, title: &Cell2, first: &Rc<Item>, second: &Rc<Item>) {
    let weak = Rc::downgrade(row);
    let (first, second) = (Rc::clone(first), Rc::clone(second));
    *title.on_write.borrow_mut() = Some(Box::new(move || {
        if let Some(row) = weak.upgrade() {
            row.set_root(first);
            row.update();
            row.set_root(second);
            row.update();
        }
    }));
}

proptest! {
    #[test]
    fn lifecycle_invariants_hold(ops in prop::collection::vec(op(), 1..40)) {
        init_logging();
        let items = [Item::new("a"), Item::new("b"), Item::new("c")];
        let (row, title) = connected();

        for op in ops {
            let mut evaluated = false;
            let mut expected_root = None;
            match op {
                Op::SetRoot(i) => row.set_root(Rc::clone(&items[i])),
                Op::Update => {
                    row.update();
                    evaluated = true;
                }
                Op::Process(i, phase) => {
                    let item: Inspectable = Rc::clone(&items[i]) as Inspectable;
                    let next = row.process_bindings(&item, i, phase);
                    if let NextPhase::Phase(next) = next {
                        prop_assert!(next > phase);
                    }
                }
                Op::Touch(i) => items[i].touch(),
                Op::Recycle => row.recycle(),
                Op::Invalidate => row.invalidate(),
                Op::Stop => {
                    row.stop_tracking();
                    prop_assert_eq!(row.live_subscriptions(), 0);
                    for item in &items {
                        prop_assert_eq!(item.notifier().subscriber_count(), 0);
                    }
                }
                Op::Restart => {
                    row.stop_tracking();
                    row.initialize();
                    evaluated = true;
                }
                Op::SwapDuringWrite(i, j, k) => {
                    row.set_root(Rc::clone(&items[i]));
                    swap_on_write(&row, &title, &items[j], &items[k]);
                    row.update();
                    *title.on_write.borrow_mut() = None;
                    prop_assert!(row.is_initialized());
                    evaluated = true;
                    expected_root = Some(k);
                }
            }

            if row.is_initialized() {
                prop_assert!(row.has_tracking());
                prop_assert!(row.data_root().is_some());
            }

            // Right after an update, phase 0 shows the root it is subscribed to.
            if evaluated && row.is_initialized() {
                let root = row.data_root().unwrap();
                if let Some(k) = expected_root {
                    prop_assert!(Rc::ptr_eq(&root, &items[k]));
                }
                prop_assert!(row.is_current(SlotId(0)));
                prop_assert_eq!(title.value(), root.title.borrow().clone());
                prop_assert!(root.notifier().subscriber_count() >= 1);
            }

            // One subscription per cache; at most one cache per observed step.
            let snapshot = row.tracking_snapshot();
            let mut keys: Vec<_> = snapshot.iter().map(|(key, _)| *key).collect();
            keys.dedup();
            prop_assert_eq!(keys.len(), snapshot.len());
            prop_assert!(snapshot.len() <= 4);

            let live: usize = items.iter().map(|item| item.notifier().subscriber_count()).sum();
            prop_assert_eq!(live, row.live_subscriptions());
        }

        drop(row);
        drop(title);
        for item in &items {
            prop_assert_eq!(item.notifier().subscriber_count(), 0);
        }
    }

    #[test]
    fn update_twice_is_a_no_op(title in "[a-z]{1,8}") {
        let item = Item::new(&title);
        let (row, _) = connected();
        row.set_root(Rc::clone(&item));
        row.update();
        let first = row.tracking_snapshot();
        let phase = row.phase_state();
        row.update();
        prop_assert_eq!(row.tracking_snapshot(), first);
        prop_assert_eq!(row.phase_state(), phase);
        prop_assert_eq!(phase, PhaseState::InPhase(1));
    }

    #[test]
    fn phases_are_visited_in_ascending_order(start in 0..3_usize) {
        let item: Inspectable = Item::new("x");
        let (row, _) = connected();
        let mut phase = 0;
        let mut visited = vec![];
        loop {
            visited.push(phase);
            match row.process_bindings(&item, start, phase) {
                NextPhase::Phase(next) => phase = next,
                NextPhase::Complete => break,
            }
        }
        prop_assert_eq!(visited, vec![0, 1, 3]);
        prop_assert_eq!(row.phase_state(), PhaseState::Complete);
    }
}
