#![allow(dead_code)]

use std::sync::Arc;

use services::{Clock, ProgressStore, StoreSettings};
use storage::{KeyValueStore, SharedMemoryStore};
use study_core::model::Catalog;

pub const KEY: &str = "chem-study-progress";

/// Two topics: `mole` (3 diagnostic, 2 practice) then `molar-mass`
/// (2 diagnostic, 1 practice). Every correct answer is choice 0.
pub const CATALOG_JSON: &str = r#"{
  "topics": [
    {
      "id": "mole",
      "name": "The Mole",
      "diagnostic": [
        { "id": "mole-d1", "prompt": "Avogadro's number?", "choices": ["6.022e23", "3.14"], "correct": 0 },
        { "id": "mole-d2", "prompt": "Moles in 12 g of C-12?", "choices": ["1", "12"], "correct": 0 },
        { "id": "mole-d3", "prompt": "Unit of amount?", "choices": ["mol", "kg", "L"], "correct": 0 }
      ],
      "practice": [
        { "id": "mole-p1", "prompt": "Particles in 2 mol?", "choices": ["1.2e24", "6e23"], "correct": 0 },
        { "id": "mole-p2", "prompt": "Moles in 3.0e23 atoms?", "choices": ["0.5", "2"], "correct": 0 }
      ]
    },
    {
      "id": "molar-mass",
      "name": "Molar Mass",
      "diagnostic": [
        { "id": "mm-d1", "prompt": "Molar mass of H2O?", "choices": ["18 g/mol", "16 g/mol"], "correct": 0 },
        { "id": "mm-d2", "prompt": "Molar mass of CO2?", "choices": ["44 g/mol", "28 g/mol"], "correct": 0 }
      ],
      "practice": [
        { "id": "mm-p1", "prompt": "Mass of 2 mol NaCl?", "choices": ["116.9 g", "58.4 g"], "correct": 0 }
      ]
    }
  ]
}"#;

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_json(CATALOG_JSON).unwrap())
}

pub async fn open(kv: Arc<dyn KeyValueStore>, clock: &Clock) -> ProgressStore {
    ProgressStore::initialize(catalog(), kv, StoreSettings::default(), clock.clone()).await
}

pub async fn open_tab(memory: &SharedMemoryStore, clock: &Clock) -> ProgressStore {
    open(Arc::new(memory.open_context()), clock).await
}

pub fn answer_all(store: &mut ProgressStore, mole: [usize; 3], molar_mass: [usize; 2]) {
    for (id, choice) in ["mole-d1", "mole-d2", "mole-d3"].into_iter().zip(mole) {
        store.record_answer(id, choice).unwrap();
    }
    for (id, choice) in ["mm-d1", "mm-d2"].into_iter().zip(molar_mass) {
        store.record_answer(id, choice).unwrap();
    }
}
