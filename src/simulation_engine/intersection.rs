use crate::simulation_engine::directions::Direction;
use crate::simulation_engine::vehicles::{may_coexist, Vehicle};
use std::sync::{Condvar, Mutex, MutexGuard};

/// Per-direction count of wait cycles since that direction was last woken.
///
/// A vehicle adds one to its origin's counter each time it parks; the
/// counter of a direction drops back to zero when that direction is woken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitCounters([usize; 4]);

impl WaitCounters {
    /// Builds counters from values given in North, South, East, West order.
    pub fn new(counts: [usize; 4]) -> Self {
        Self(counts)
    }

    pub fn get(&self, direction: Direction) -> usize {
        self.0[direction.index()]
    }

    pub fn record_wait(&mut self, direction: Direction) {
        self.0[direction.index()] += 1;
    }

    pub fn reset(&mut self, direction: Direction) {
        self.0[direction.index()] = 0;
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// The direction with the strictly largest counter. Ties go to the
    /// direction that comes first in North, South, East, West order.
    pub fn most_starved(&self) -> Direction {
        let mut chosen = Direction::North;
        for direction in Direction::ALL {
            if self.get(direction) > self.get(chosen) {
                chosen = direction;
            }
        }
        chosen
    }
}

/// Vehicles currently inside the intersection.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    vehicles: Vec<Vehicle>,
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `vehicle` may coexist with every current occupant.
    pub fn admits(&self, vehicle: &Vehicle) -> bool {
        self.vehicles.iter().all(|occupant| may_coexist(occupant, vehicle))
    }

    pub fn insert(&mut self, vehicle: Vehicle) {
        self.vehicles.push(vehicle);
    }

    /// Removes one occupant equal to `vehicle`, the first one found.
    pub fn remove_first(&mut self, vehicle: &Vehicle) -> Option<Vehicle> {
        let position = self.vehicles.iter().position(|occupant| occupant == vehicle)?;
        Some(self.vehicles.swap_remove(position))
    }

    /// Checks that every pair of occupants may coexist.
    pub fn is_compatible(&self) -> bool {
        self.vehicles.iter().enumerate().all(|(i, a)| {
            self.vehicles[i + 1..]
                .iter()
                .all(|b| may_coexist(a, b))
        })
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }
}

#[derive(Debug, Default)]
struct IntersectionState {
    occupancy: Occupancy,
    waiting: WaitCounters,
    // Bumped on every broadcast so parked vehicles can tell a real wake-up
    // from a spurious one.
    wake_rounds: [u64; 4],
}

/// Admission control for a four-way intersection.
///
/// Vehicle threads call [`before_entry`](Self::before_entry) before crossing
/// and [`after_exit`](Self::after_exit) once they are through. Every state
/// change happens under a single mutex. Blocked vehicles park on the
/// condition variable of their origin direction; each exit wakes the
/// direction that has waited the most.
pub struct IntersectionManager {
    state: Mutex<IntersectionState>,
    channels: [Condvar; 4],
}

impl IntersectionManager {
    /// Creates an empty intersection with all wait counters at zero.
    pub fn initialize() -> Self {
        log::debug!("Intersection manager initialized");
        Self {
            state: Mutex::new(IntersectionState::default()),
            channels: [Condvar::new(), Condvar::new(), Condvar::new(), Condvar::new()],
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, IntersectionState> {
        self.state.lock().expect("intersection mutex poisoned")
    }

    /// Blocks until a vehicle going from `origin` to `destination` can enter
    /// without conflicting with anyone inside, then records it as an occupant.
    pub fn before_entry(&self, origin: Direction, destination: Direction) {
        let vehicle = Vehicle::new(origin, destination);
        let channel = &self.channels[origin.index()];
        let mut state = self.lock_state();

        while !state.occupancy.admits(&vehicle) {
            state.waiting.record_wait(origin);
            let round = state.wake_rounds[origin.index()];
            log::trace!(
                "{} -> {} waiting ({} parked on {})",
                origin,
                destination,
                state.waiting.get(origin),
                origin
            );
            state = channel
                .wait_while(state, |s| s.wake_rounds[origin.index()] == round)
                .expect("intersection mutex poisoned");
        }

        state.occupancy.insert(vehicle);
        debug_assert!(state.occupancy.is_compatible());
        log::trace!(
            "{} -> {} entered ({} inside)",
            origin,
            destination,
            state.occupancy.len()
        );
    }

    /// Removes one occupant matching `origin`/`destination` and wakes every
    /// vehicle parked on the most starved direction.
    ///
    /// An exit for a vehicle that is not inside is ignored.
    pub fn after_exit(&self, origin: Direction, destination: Direction) {
        let vehicle = Vehicle::new(origin, destination);
        let mut state = self.lock_state();

        if state.occupancy.remove_first(&vehicle).is_none() {
            log::warn!(
                "Exit reported for {} -> {} but no such vehicle is inside",
                origin,
                destination
            );
            return;
        }

        let woken = state.waiting.most_starved();
        let waited = state.waiting.get(woken);
        state.waiting.reset(woken);
        let round = &mut state.wake_rounds[woken.index()];
        *round = round.wrapping_add(1);
        self.channels[woken.index()].notify_all();
        log::trace!(
            "{} -> {} left ({} inside), waking {} after {} waits",
            origin,
            destination,
            state.occupancy.len(),
            woken,
            waited
        );
    }

    /// Snapshot of the vehicles currently inside.
    pub fn occupants(&self) -> Vec<Vehicle> {
        self.lock_state().occupancy.vehicles().to_vec()
    }

    /// Snapshot of the per-direction wait counters.
    pub fn wait_counts(&self) -> WaitCounters {
        self.lock_state().waiting
    }

    /// Tears the intersection down at the end of a run.
    ///
    /// Taking `self` by value means every thread holding a reference must be
    /// gone, so nobody can still be parked on a channel.
    pub fn cleanup(self) {
        match self.state.into_inner() {
            Ok(state) => {
                if !state.occupancy.is_empty() || state.waiting.total() > 0 {
                    log::warn!(
                        "Intersection cleaned up with {} vehicles inside and wait counts {:?}",
                        state.occupancy.len(),
                        state.waiting
                    );
                }
            }
            Err(_) => log::warn!("Intersection cleaned up after a vehicle thread panicked"),
        }
        log::debug!("Intersection manager cleaned up");
    }
}

impl Default for IntersectionManager {
    fn default() -> Self {
        Self::initialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};
    use Direction::*;

    fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn most_starved_picks_largest_counter() {
        assert_eq!(WaitCounters::new([3, 1, 0, 0]).most_starved(), North);
        assert_eq!(WaitCounters::new([0, 1, 5, 2]).most_starved(), East);
        assert_eq!(WaitCounters::new([0, 0, 0, 1]).most_starved(), West);
    }

    #[test]
    fn most_starved_breaks_ties_in_enumeration_order() {
        assert_eq!(WaitCounters::new([2, 2, 0, 0]).most_starved(), North);
        assert_eq!(WaitCounters::new([0, 1, 4, 4]).most_starved(), East);
        assert_eq!(WaitCounters::default().most_starved(), North);
    }

    #[test]
    fn remove_first_takes_exactly_one_match() {
        let mut occupancy = Occupancy::new();
        occupancy.insert(Vehicle::new(North, East));
        occupancy.insert(Vehicle::new(North, East));
        occupancy.insert(Vehicle::new(South, West));

        assert_eq!(
            occupancy.remove_first(&Vehicle::new(North, East)),
            Some(Vehicle::new(North, East))
        );

        let remaining = occupancy.vehicles();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining.iter().filter(|v| **v == Vehicle::new(North, East)).count(), 1);
        assert_eq!(remaining.iter().filter(|v| **v == Vehicle::new(South, West)).count(), 1);
    }

    #[test]
    fn remove_first_without_match_changes_nothing() {
        let mut occupancy = Occupancy::new();
        occupancy.insert(Vehicle::new(West, South));
        assert_eq!(occupancy.remove_first(&Vehicle::new(East, North)), None);
        assert_eq!(occupancy.len(), 1);
    }

    #[test]
    fn right_turns_enter_together() {
        let manager = IntersectionManager::initialize();
        manager.before_entry(West, South);
        manager.before_entry(East, North);

        let occupants = manager.occupants();
        assert_eq!(occupants.len(), 2);
        assert!(occupants.contains(&Vehicle::new(West, South)));
        assert!(occupants.contains(&Vehicle::new(East, North)));

        manager.after_exit(West, South);
        manager.after_exit(East, North);
        assert!(manager.occupants().is_empty());
        manager.cleanup();
    }

    #[test]
    fn identical_vehicles_leave_one_at_a_time() {
        let manager = IntersectionManager::initialize();
        manager.before_entry(North, East);
        manager.before_entry(North, East);
        manager.before_entry(North, South);

        manager.after_exit(North, East);

        let occupants = manager.occupants();
        assert_eq!(occupants.len(), 2);
        assert!(occupants.contains(&Vehicle::new(North, East)));
        assert!(occupants.contains(&Vehicle::new(North, South)));
    }

    #[test]
    fn conflicting_vehicle_waits_for_exit() {
        let manager = Arc::new(IntersectionManager::initialize());
        manager.before_entry(North, East);

        let entered = Arc::new(AtomicBool::new(false));
        let handle = {
            let manager = Arc::clone(&manager);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                manager.before_entry(South, West);
                entered.store(true, Ordering::SeqCst);
            })
        };

        wait_until("South to park", || manager.wait_counts().get(South) == 1);
        assert!(!entered.load(Ordering::SeqCst));
        assert_eq!(manager.occupants(), vec![Vehicle::new(North, East)]);

        manager.after_exit(North, East);
        handle.join().expect("vehicle thread panicked");

        assert!(entered.load(Ordering::SeqCst));
        assert_eq!(manager.occupants(), vec![Vehicle::new(South, West)]);
        assert_eq!(manager.wait_counts(), WaitCounters::default());
    }

    #[test]
    fn exit_wakes_the_direction_that_is_waiting() {
        let manager = Arc::new(IntersectionManager::initialize());
        manager.before_entry(North, South);

        let handle = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.before_entry(East, West))
        };
        wait_until("East to park", || manager.wait_counts().get(East) == 1);

        // North comes first in tie-breaks but has nobody waiting.
        manager.after_exit(North, South);
        handle.join().expect("vehicle thread panicked");

        assert_eq!(manager.occupants(), vec![Vehicle::new(East, West)]);
        assert_eq!(manager.wait_counts().total(), 0);
    }

    #[test]
    fn stray_notify_does_not_wake_a_parked_vehicle() {
        let manager = Arc::new(IntersectionManager::initialize());
        manager.before_entry(North, East);

        let entered = Arc::new(AtomicBool::new(false));
        let handle = {
            let manager = Arc::clone(&manager);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                manager.before_entry(South, West);
                entered.store(true, Ordering::SeqCst);
            })
        };
        wait_until("South to park", || manager.wait_counts().get(South) == 1);

        // Wake-ups without a broadcast from after_exit must be absorbed.
        for _ in 0..5 {
            manager.channels[South.index()].notify_all();
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(manager.wait_counts(), WaitCounters::new([0, 1, 0, 0]));
        assert!(!entered.load(Ordering::SeqCst));

        manager.after_exit(North, East);
        handle.join().expect("vehicle thread panicked");
        assert!(entered.load(Ordering::SeqCst));
        assert_eq!(manager.occupants(), vec![Vehicle::new(South, West)]);
    }

    #[test]
    fn exit_wakes_only_the_most_starved_direction() {
        let manager = Arc::new(IntersectionManager::initialize());
        // West -> East blocks both North -> South and East -> South.
        manager.before_entry(West, East);

        let spawn_vehicle = |origin: Direction, destination: Direction, entered: &Arc<AtomicUsize>| {
            let manager = Arc::clone(&manager);
            let entered = Arc::clone(entered);
            thread::spawn(move || {
                manager.before_entry(origin, destination);
                entered.fetch_add(1, Ordering::SeqCst);
            })
        };
        let north_entered = Arc::new(AtomicUsize::new(0));
        let east_entered = Arc::new(AtomicUsize::new(0));
        let north = spawn_vehicle(North, South, &north_entered);
        let east: Vec<_> = (0..2)
            .map(|_| spawn_vehicle(East, South, &east_entered))
            .collect();

        wait_until("North once and East twice to park", || {
            manager.wait_counts() == WaitCounters::new([1, 0, 2, 0])
        });

        manager.after_exit(West, East);
        for handle in east {
            handle.join().expect("vehicle thread panicked");
        }

        assert_eq!(east_entered.load(Ordering::SeqCst), 2);
        assert_eq!(north_entered.load(Ordering::SeqCst), 0);
        // North was never woken, so it has not parked a second time.
        assert_eq!(manager.wait_counts(), WaitCounters::new([1, 0, 0, 0]));
        assert_eq!(
            manager.occupants(),
            vec![Vehicle::new(East, South), Vehicle::new(East, South)]
        );

        manager.after_exit(East, South);
        manager.after_exit(East, South);
        north.join().expect("vehicle thread panicked");
        assert_eq!(north_entered.load(Ordering::SeqCst), 1);
        assert_eq!(manager.occupants(), vec![Vehicle::new(North, South)]);
    }

    #[test]
    fn unmatched_exit_is_ignored() {
        let manager = IntersectionManager::initialize();
        manager.before_entry(West, East);
        manager.after_exit(East, West);
        assert_eq!(manager.occupants(), vec![Vehicle::new(West, East)]);
    }

    #[test]
    fn random_traffic_stays_safe_and_finishes() {
        let manager = Arc::new(IntersectionManager::initialize());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let crossings = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|id| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                let crossings = Arc::clone(&crossings);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(id as u64);
                    barrier.wait();
                    for _ in 0..200 {
                        let origin = Direction::ALL[rng.random_range(0..4)];
                        let exits: Vec<_> = origin.exits().collect();
                        let destination = exits[rng.random_range(0..exits.len())];

                        manager.before_entry(origin, destination);
                        let inside = manager.occupants();
                        let mut occupancy = Occupancy::new();
                        for vehicle in inside {
                            occupancy.insert(vehicle);
                        }
                        assert!(occupancy.is_compatible(), "unsafe occupancy {:?}", occupancy);
                        if rng.random_bool(0.5) {
                            thread::yield_now();
                        }
                        manager.after_exit(origin, destination);
                        crossings.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("vehicle thread panicked");
        }

        assert_eq!(crossings.load(Ordering::SeqCst), threads * 200);
        assert!(manager.occupants().is_empty());
        match Arc::try_unwrap(manager) {
            Ok(manager) => manager.cleanup(),
            Err(_) => panic!("manager still shared after join"),
        }
    }
}
