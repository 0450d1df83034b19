use serde::Serialize;

/// Performance tier of a predicted grade, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PerformanceTier {
    Excellent,
    Good,
    Regular,
    Insufficient,
}

impl PerformanceTier {
    pub const ALL: [PerformanceTier; 4] = [
        PerformanceTier::Excellent,
        PerformanceTier::Good,
        PerformanceTier::Regular,
        PerformanceTier::Insufficient,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "Excellent",
            PerformanceTier::Good => "Good",
            PerformanceTier::Regular => "Regular",
            PerformanceTier::Insufficient => "Insufficient",
        }
    }

    /// Style class used when rendering the result.
    pub fn css_class(self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "excellent",
            PerformanceTier::Good => "good",
            PerformanceTier::Regular => "regular",
            PerformanceTier::Insufficient => "insufficient",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "The student's performance is outstanding.",
            PerformanceTier::Good => "The student is performing well.",
            PerformanceTier::Regular => "The student is at the minimum passing level.",
            PerformanceTier::Insufficient => {
                "The student does not reach the minimum level to pass."
            }
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            PerformanceTier::Excellent => {
                "Offer more advanced assignments or projects to keep them motivated."
            }
            PerformanceTier::Good => {
                "Keep up the pace and reinforce the areas where they struggle."
            }
            PerformanceTier::Regular => {
                "Dedicate more time to study and complete every assignment."
            }
            PerformanceTier::Insufficient => {
                "Needs an urgent improvement plan with tutoring and close follow-up."
            }
        }
    }
}

/// Inclusive lower bounds, checked top-down. 10.5 is the pass mark.
pub fn classify(grade: f64) -> PerformanceTier {
    if grade >= 17.0 {
        PerformanceTier::Excellent
    } else if grade >= 14.0 {
        PerformanceTier::Good
    } else if grade >= 10.5 {
        PerformanceTier::Regular
    } else {
        PerformanceTier::Insufficient
    }
}
