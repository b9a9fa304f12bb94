//! Fixed session content: interview prompts, PHQ-8 items and canned lines.
//!
//! Prompts use `**emphasis**` markup; speech output strips it and the
//! presentation layer may render it.

/// Number of interview prompts.  Reaching it ends the interview.
pub const N_PROMPTS: usize = 8;

pub const ASSISTANT_NAME: &str = "Mira";

pub const INTERVIEW_PROMPTS: [&str; N_PROMPTS] = [
    "Hey there! I'm **Mira**, your MindScan assistant. I'm just going to ask you a few casual \
     questions — no right or wrong answers, just be yourself.\n\n**So, how are you doing today? \
     How's life been?**",
    "Thanks for sharing. **What do you usually do for fun?** Have you been enjoying those things \
     lately, or not so much?",
    "Got it. **How have you been sleeping?** Like, do you sleep well or has it been tough?",
    "**How's your energy been?** Do you feel tired a lot, or are you generally okay?",
    "**Can you focus on things easily?** Like work, studying, watching something — or do you \
     zone out a lot?",
    "**How are things with your friends and family?** Do you feel close to people, or more alone \
     lately?",
    "**When you think about the future**, how does it feel? Exciting, stressful, or kinda blank?",
    "Last one — **is there anything that's been really bothering you lately?** Anything weighing \
     on your mind?",
];

/// Short topic label per prompt, for the progress list.
pub const INTERVIEW_TOPICS: [&str; N_PROMPTS] = [
    "General wellbeing",
    "Interests & hobbies",
    "Sleep quality",
    "Energy levels",
    "Focus & concentration",
    "Social connection",
    "Future outlook",
    "Worries & concerns",
];

/// Shown when the last prompt has been answered.
pub const CLOSING_MESSAGE: &str = "Thank you so much for chatting with me! I really appreciate \
     you being so open. Now we just have a quick questionnaire — 8 short questions. Almost done!";

/// Spoken alongside [`CLOSING_MESSAGE`].
pub const CLOSING_SPOKEN: &str =
    "Thank you so much for chatting with me! Now let's do a quick questionnaire.";

/// Played by the Setup voice check.
pub const VOICE_TEST_LINE: &str = "Hi! I'm Mira, your MindScan assistant. I'll be guiding you \
     through a short conversation. Can you hear me clearly?";

pub const PHQ_QUESTIONS: [&str; 8] = [
    "Little interest or pleasure in doing things",
    "Feeling down, depressed, or hopeless",
    "Trouble falling or staying asleep, or sleeping too much",
    "Feeling tired or having little energy",
    "Poor appetite or overeating",
    "Feeling bad about yourself — or that you are a failure or have let yourself or your family \
     down",
    "Trouble concentrating on things, such as reading the newspaper or watching television",
    "Moving or speaking so slowly that other people could have noticed. Or the opposite — being \
     so fidgety or restless that you have been moving around a lot more than usual",
];

/// One answer option; `value` is also its keyboard shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhqOption {
    pub value: u8,
    pub label: &'static str,
}

pub const PHQ_OPTIONS: [PhqOption; 4] = [
    PhqOption {
        value: 0,
        label: "Not at all",
    },
    PhqOption {
        value: 1,
        label: "Several days",
    },
    PhqOption {
        value: 2,
        label: "More than half the days",
    },
    PhqOption {
        value: 3,
        label: "Nearly every day",
    },
];
