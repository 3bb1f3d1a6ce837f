//! School levels and their default assessment categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchoolLevel {
    #[default]
    #[serde(rename = "Primary School")]
    Primary,
    #[serde(rename = "High School")]
    High,
}

impl SchoolLevel {
    /// Wire and display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "Primary School",
            Self::High => "High School",
        }
    }
}

impl fmt::Display for SchoolLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchoolLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "primary school" | "primary-school" => Ok(Self::Primary),
            "high" | "high school" | "high-school" => Ok(Self::High),
            other => Err(format!("unknown school level: {other}")),
        }
    }
}

/// One assessment category as edited on the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Stable identifier sent to the backend.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl Category {
    /// A copy with the teacher's selections cleared.
    #[must_use]
    pub fn blank(&self) -> Self {
        Self { value: String::new(), comments: String::new(), ..self.clone() }
    }
}

struct Preset {
    key: &'static str,
    label: &'static str,
    options: &'static [&'static str],
}

impl Preset {
    fn category(&self) -> Category {
        Category {
            key: self.key.to_owned(),
            label: self.label.to_owned(),
            value: String::new(),
            comments: String::new(),
            options: self.options.iter().map(|o| (*o).to_owned()).collect(),
        }
    }
}

/// Fresh, empty categories for `level`.
#[must_use]
pub fn default_categories(level: SchoolLevel) -> Vec<Category> {
    let presets = match level {
        SchoolLevel::Primary => PRIMARY,
        SchoolLevel::High => HIGH_SCHOOL,
    };
    presets.iter().map(Preset::category).collect()
}

const PRIMARY: &[Preset] = &[
    Preset {
        key: "academicPerformance",
        label: "Academic Performance",
        options: &[
            "Outstanding grasp of subject material",
            "Demonstrates strong understanding of concepts",
            "Meets expectations but needs refinement in key areas",
            "Struggles with core subject material",
            "Needs significant support to progress",
        ],
    },
    Preset {
        key: "effortWorkEthic",
        label: "Effort & Work Ethic",
        options: &[
            "Highly motivated and consistently works hard",
            "Completes tasks on time with good effort",
            "Occasionally inconsistent with effort",
            "Needs encouragement to stay on task",
            "Frequently does not complete work or lacks focus",
        ],
    },
    Preset {
        key: "participationEngagement",
        label: "Participation & Engagement",
        options: &[
            "Actively participates and contributes insightful ideas",
            "Engages in discussions and asks thoughtful questions",
            "Participates when prompted but lacks confidence",
            "Rarely contributes to discussions",
            "Does not engage with class activities",
        ],
    },
    Preset {
        key: "behaviorAttitude",
        label: "Behavior & Attitude",
        options: &[
            "Respectful, well-behaved, and a role model in class",
            "Generally well-mannered and cooperative",
            "Can be disruptive at times but responds to guidance",
            "Frequently distracts others and disrupts learning",
            "Disrespectful or uncooperative; needs intervention",
        ],
    },
    Preset {
        key: "attendancePunctuality",
        label: "Attendance & Punctuality",
        options: &[
            "Excellent attendance and always punctual",
            "Rarely absent and arrives on time",
            "Occasionally absent or late, impacting progress",
            "Frequently absent, missing key learning opportunities",
            "Poor attendance; at risk of falling behind",
        ],
    },
    Preset {
        key: "socialEmotionalDevelopment",
        label: "Social & Emotional Development",
        options: &[
            "Builds strong friendships and collaborates well",
            "Is kind and empathetic towards others",
            "Occasionally struggles with emotional regulation",
            "Needs guidance to develop better social skills",
            "Has difficulty managing emotions and social interactions",
        ],
    },
    Preset {
        key: "independenceResponsibility",
        label: "Independence & Responsibility",
        options: &[
            "Highly self-motivated and takes responsibility for learning",
            "Manages workload well with minimal teacher support",
            "Needs occasional reminders to stay organized",
            "Struggles with deadlines and self-organization",
            "Relies heavily on teacher guidance to complete tasks",
        ],
    },
    Preset {
        key: "areasForImprovement",
        label: "Areas for Improvement",
        options: &[
            "Needs to refine analytical skills",
            "Should focus on improving written communication",
            "Would benefit from additional practice in problem-solving",
            "Should work on time management and deadlines",
            "Needs to improve classroom participation",
        ],
    },
];

const HIGH_SCHOOL: &[Preset] = &[
    Preset {
        key: "subject",
        label: "Subject",
        options: &[
            "English",
            "Mathematics",
            "Science (Biology, Chemistry, Physics)",
            "History",
            "Geography",
            "Business Studies",
            "Economics",
            "Computer Science",
            "Physical Education",
            "Foreign Languages",
            "Arts (Music, Drama, Visual Arts)",
            "Technology (Design & Tech, Engineering)",
        ],
    },
    Preset {
        key: "academicPerformance",
        label: "Academic Performance",
        options: &[
            "Exceeds expectations with outstanding comprehension and application of subject matter.",
            "Demonstrates a solid understanding and meets course objectives consistently.",
            "Meets basic requirements but needs improvement in certain areas.",
            "Struggles to grasp essential concepts; requires additional support.",
            "Fails to meet course standards; significant intervention needed.",
        ],
    },
    Preset {
        key: "effortAndWorkEthic",
        label: "Effort and Work Ethic",
        options: &[
            "Consistently exhibits exceptional dedication and diligence in all tasks.",
            "Shows a strong work ethic with regular completion of assignments.",
            "Maintains an acceptable level of effort but lacks consistency.",
            "Often displays minimal effort; assignments are frequently incomplete.",
            "Rarely engages in coursework; demonstrates a lack of initiative.",
        ],
    },
    Preset {
        key: "classParticipation",
        label: "Class Participation",
        options: &[
            "Actively contributes to discussions, enhancing the learning environment.",
            "Participates regularly with meaningful input.",
            "Engages occasionally but often needs prompting.",
            "Seldom participates; tends to be passive during activities.",
            "Does not engage in class activities; remains disengaged.",
        ],
    },
    Preset {
        key: "behaviorAndConduct",
        label: "Behavior and Conduct",
        options: &[
            "Exemplary behavior; serves as a role model for peers.",
            "Generally displays positive conduct with minor infractions.",
            "Occasionally exhibits disruptive behavior; improvement needed.",
            "Frequently disregards rules; behavior is a concern.",
            "Consistently exhibits unacceptable behavior; immediate action required.",
        ],
    },
    Preset {
        key: "attendanceAndPunctuality",
        label: "Attendance and Punctuality",
        options: &[
            "Perfect attendance and always punctual.",
            "Rarely absent or late; attendance is commendable.",
            "Occasional absences or tardiness; monitor for patterns.",
            "Frequent absences/tardiness affecting performance.",
            "Chronic absenteeism/tardiness; immediate intervention needed.",
        ],
    },
    Preset {
        key: "homeworkAndAssignments",
        label: "Homework and Assignments",
        options: &[
            "All assignments submitted on time with exceptional quality.",
            "Assignments are consistently complete and punctual.",
            "Occasionally misses deadlines or submits incomplete work.",
            "Frequently late or incomplete assignments.",
            "Rarely submits assignments; significant improvement needed.",
        ],
    },
    Preset {
        key: "problemSolvingCriticalThinking",
        label: "Problem-Solving & Critical Thinking",
        options: &[
            "Exceptional ability to analyze and apply knowledge.",
            "Thinks critically and approaches problems logically.",
            "Can apply concepts but struggles with deeper analysis.",
            "Finds it difficult to apply knowledge in new contexts.",
            "Requires structured guidance to develop problem-solving skills.",
        ],
    },
    Preset {
        key: "socialSkills",
        label: "Social Skills",
        options: &[
            "Demonstrates excellent interpersonal skills; highly cooperative.",
            "Interacts well with peers; generally cooperative.",
            "Has some difficulty in peer interactions; improvement needed.",
            "Struggles with social interactions; often uncooperative.",
            "Displays antisocial behavior; intervention recommended.",
        ],
    },
    Preset {
        key: "extracurricularInvolvement",
        label: "Extracurricular Involvement",
        options: &[
            "Actively engaged in multiple extracurricular activities; shows leadership.",
            "Participates in one or more activities regularly.",
            "Occasionally involved in extracurriculars; could increase participation.",
            "Rarely participates in activities beyond academics.",
            "No involvement in extracurricular activities.",
        ],
    },
    Preset {
        key: "collegeAndCareerReadiness",
        label: "College and Career Readiness",
        options: &[
            "Demonstrates a clear plan and preparedness for post-secondary endeavors.",
            "Shows awareness and some preparation for future opportunities.",
            "Needs guidance to develop post-secondary plans.",
            "Lacks direction regarding college or career paths.",
            "Unprepared for post-secondary challenges; immediate counseling advised.",
        ],
    },
];

#[cfg(test)]
#[path = "categories_test.rs"]
mod tests;
