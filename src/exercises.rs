//! Built-in exercise reference lists served read-only.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExerciseCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: u32,
    pub name: &'static str,
    pub category_id: &'static str,
    pub description: &'static str,
    #[schema(value_type = Vec<String>)]
    pub body_parts: &'static [&'static str],
    pub difficulty: Difficulty,
    pub sets: u8,
    pub reps: &'static str,
}

static CATEGORIES: &[ExerciseCategory] = &[
    ExerciseCategory { id: "mobility", name: "Mobility", description: "Range-of-motion work for stiff joints" },
    ExerciseCategory { id: "strength", name: "Strength", description: "Progressive loading to rebuild support around an injury" },
    ExerciseCategory { id: "stretching", name: "Stretching", description: "Gentle lengthening held for time" },
    ExerciseCategory { id: "balance", name: "Balance", description: "Proprioception and stability drills" },
];

static EXERCISES: &[Exercise] = &[
    Exercise {
        id: 1,
        name: "Neck rotations",
        category_id: "mobility",
        description: "Slowly turn the head side to side within a pain-free range.",
        body_parts: &["neck"],
        difficulty: Difficulty::Beginner,
        sets: 2,
        reps: "10 each side",
    },
    Exercise {
        id: 2,
        name: "Pendulum swings",
        category_id: "mobility",
        description: "Lean on a table and let the arm hang, drawing small circles.",
        body_parts: &["shoulder"],
        difficulty: Difficulty::Beginner,
        sets: 3,
        reps: "30 seconds",
    },
    Exercise {
        id: 3,
        name: "Cat-cow",
        category_id: "mobility",
        description: "On hands and knees, alternate arching and rounding the spine.",
        body_parts: &["back"],
        difficulty: Difficulty::Beginner,
        sets: 2,
        reps: "10",
    },
    Exercise {
        id: 4,
        name: "Wall sit",
        category_id: "strength",
        description: "Slide down a wall until knees are bent and hold.",
        body_parts: &["knee", "hip"],
        difficulty: Difficulty::Intermediate,
        sets: 3,
        reps: "30 seconds",
    },
    Exercise {
        id: 5,
        name: "Glute bridge",
        category_id: "strength",
        description: "Lying on the back, lift the hips until the body forms a straight line.",
        body_parts: &["hip", "back"],
        difficulty: Difficulty::Beginner,
        sets: 3,
        reps: "12",
    },
    Exercise {
        id: 6,
        name: "Resistance band external rotation",
        category_id: "strength",
        description: "Elbow at the side, rotate the forearm outward against a band.",
        body_parts: &["shoulder"],
        difficulty: Difficulty::Intermediate,
        sets: 3,
        reps: "15",
    },
    Exercise {
        id: 7,
        name: "Single-leg Romanian deadlift",
        category_id: "strength",
        description: "Hinge at the hip on one leg keeping the back flat.",
        body_parts: &["hip", "knee", "ankle"],
        difficulty: Difficulty::Advanced,
        sets: 3,
        reps: "8 each side",
    },
    Exercise {
        id: 8,
        name: "Hamstring stretch",
        category_id: "stretching",
        description: "Seated, reach toward the toes of a straight leg.",
        body_parts: &["knee", "back"],
        difficulty: Difficulty::Beginner,
        sets: 2,
        reps: "30 seconds",
    },
    Exercise {
        id: 9,
        name: "Wrist flexor stretch",
        category_id: "stretching",
        description: "Arm straight, gently pull the fingers back with the other hand.",
        body_parts: &["wrist", "elbow"],
        difficulty: Difficulty::Beginner,
        sets: 2,
        reps: "20 seconds",
    },
    Exercise {
        id: 10,
        name: "Calf stretch",
        category_id: "stretching",
        description: "Hands on a wall, step one foot back and press the heel down.",
        body_parts: &["ankle"],
        difficulty: Difficulty::Beginner,
        sets: 2,
        reps: "30 seconds each side",
    },
    Exercise {
        id: 11,
        name: "Single-leg stance",
        category_id: "balance",
        description: "Stand on one foot near a support, progressing to eyes closed.",
        body_parts: &["ankle", "knee"],
        difficulty: Difficulty::Beginner,
        sets: 3,
        reps: "30 seconds each side",
    },
    Exercise {
        id: 12,
        name: "Heel-to-toe walk",
        category_id: "balance",
        description: "Walk in a straight line placing heel directly in front of toes.",
        body_parts: &["ankle", "hip"],
        difficulty: Difficulty::Intermediate,
        sets: 2,
        reps: "20 steps",
    },
];

pub fn categories() -> &'static [ExerciseCategory] {
    CATEGORIES
}

/// All exercises, or only those in `category` when given.
pub fn exercises(category: Option<&str>) -> Vec<&'static Exercise> {
    EXERCISES
        .iter()
        .filter(|e| category.map_or(true, |c| e.category_id == c))
        .collect()
}

pub fn is_known_category(id: &str) -> bool {
    CATEGORIES.iter().any(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_exercise_has_a_known_category() {
        for e in exercises(None) {
            assert!(is_known_category(e.category_id), "{} has unknown category", e.name);
        }
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = exercises(None).iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), EXERCISES.len());
    }

    #[test]
    fn filter_by_category() {
        let balance = exercises(Some("balance"));
        assert_eq!(balance.len(), 2);
        assert!(balance.iter().all(|e| e.category_id == "balance"));
        assert!(exercises(Some("nope")).is_empty());
    }
}
