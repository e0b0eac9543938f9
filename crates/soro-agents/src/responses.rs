//! Canned SoroMind responses and PSN Connect chat lines.

use rand::seq::SliceRandom;

use soro_core::interventions::InterventionPlan;
use soro_core::messages::ChatMessageType;
use soro_core::models::{GroupSession, PeerRecord, SessionFormat};

pub fn crisis() -> String {
    "🚨 I'm really concerned about what you're sharing. Your safety is the most important thing right now.

**IMMEDIATE HELP AVAILABLE:**
• National Suicide Prevention Lifeline: **988** or 1-800-273-8255
• Crisis Text Line: Text **HOME** to 741741
• Emergency Services: **911**

You don't have to go through this alone. Please reach out to one of these resources **right now**. They have trained professionals who can help you through this moment.

I'm here to support you, but please connect with these immediate resources first."
        .to_string()
}

pub fn academic_stress() -> String {
    "I hear you're feeling overwhelmed with exams. This is really common, and there are effective ways to manage this.

**For Exam Stress:**
• **Pomodoro Technique**: 25 minutes study, 5 minutes break
• **Study Planning**: Break material into smaller chunks
• **Self-Compassion**: Remember it's normal to feel stressed before exams

**Sleep Support:**
• **Digital Curfew**: No screens 1 hour before bed
• **4-7-8 Breathing**: Inhale 4s, hold 7s, exhale 8s
• **Consistent Schedule**: Same bedtime/wake time even on weekends

Would you like specific study techniques, sleep help, or to connect with other students?"
        .to_string()
}

pub fn sleep_issues() -> String {
    "Sleep issues often accompany stress. Here are evidence-based techniques:

**Sleep Hygiene:**
• Keep your bed for sleep only (no studying in bed)
• Cool, dark, quiet room
• Consistent wake time (even weekends)

**Relaxation Techniques:**
• Progressive Muscle Relaxation
• Guided sleep meditations
• Journaling worries before bed

**Immediate Help:**
• 4-7-8 breathing exercise
• Body scan meditation

Would you like to try one of these techniques now?"
        .to_string()
}

pub fn box_breathing() -> String {
    "Let's try Box Breathing together. This can calm your nervous system in minutes:

**Box Breathing Exercise:**
1. **Breathe IN** slowly for 4 seconds...
2. **HOLD** your breath for 4 seconds...
3. **Breathe OUT** slowly for 4 seconds...
4. **HOLD** empty for 4 seconds...

Repeat this cycle 4-5 times.

Notice how your body feels. Would you like to continue with another cycle, or try a different technique?"
        .to_string()
}

/// Group list rendered from the knowledge base roster.
pub fn groups(groups: &[GroupSession]) -> String {
    let mut out = String::from("I can help connect you with supportive groups:\n\n**Available Groups:**\n");
    for group in groups {
        let format = match group.format {
            SessionFormat::Virtual => "virtual",
            SessionFormat::InPerson => "in person",
        };
        out.push_str(&format!(
            "• **{}** ({}, {}, {} min)\n",
            group.name, group.schedule, format, group.duration_minutes
        ));
    }
    out.push_str(
        "\nThese groups are facilitated by trained peers who understand what you're going through.\n\n\
         Would you like me to check availability for any of these?",
    );
    out
}

/// Peer list rendered from the knowledge base roster.
pub fn peers(peers: &[PeerRecord]) -> String {
    let mut out = String::from(
        "I can connect you with a peer supporter who understands what you're facing.\n\n**Available Peer Supporters:**\n",
    );
    for peer in peers {
        let focus = peer
            .expertise
            .iter()
            .take(2)
            .map(|e| e.replace('_', " "))
            .collect::<Vec<_>>()
            .join(" and ");
        out.push_str(&format!(
            "• **{}** - Experienced with {}, available {}\n",
            peer.name,
            focus,
            peer.availability.join("/")
        ));
    }
    out.push_str("\nThey've helped others through similar challenges. Would you like an introduction?");
    out
}

pub fn resources() -> String {
    "I can connect you with various mental health resources:

**Immediate Support:**
• Crisis Hotline: 988 (24/7)
• Online therapy platforms with immediate sessions

**Ongoing Support:**
• University counseling services (if applicable)
• Community mental health centers
• Support groups for stress and anxiety

**Self-Help Resources:**
• Mental health apps (Calm, Headspace)
• Online CBT programs
• Wellness workshops

What type of support are you looking for specifically?"
        .to_string()
}

pub fn coping_strategies() -> String {
    "Here are some effective coping strategies for stress:

**Quick Relief (5 minutes or less):**
• Box Breathing exercise
• 5-4-3-2-1 Grounding technique
• Progressive Muscle Relaxation

**Daily Practices:**
• Mindful walking
• Gratitude journaling
• Scheduled worry time

**Academic Specific:**
• Study scheduling with breaks
• Task prioritization
• Self-compassion breaks

Would you like to try one of these now, or learn more about a specific technique?"
        .to_string()
}

pub fn self_care_plan() -> String {
    "Let's build a simple self-care plan together:

**Daily Foundation:**
• Sleep: Aim for 7-8 hours consistent schedule
• Nutrition: Regular meals, stay hydrated
• Movement: 20-30 minutes daily (walking counts!)

**Stress Management:**
• Morning: 5 minutes of deep breathing
• Study breaks: Every 45-60 minutes
• Evening: Digital detox 1 hour before bed

**Emotional Support:**
• Connect with one supportive person daily
• Acknowledge small accomplishments
• Practice self-compassion

Would you like to customize any part of this plan for your situation?"
        .to_string()
}

pub fn overwhelmed() -> String {
    "Feeling overwhelmed is your system saying \"too much, too fast.\" Let's break this down:

**Right Now:**
• Stop and take 3 deep breaths
• Name 3 things you can see around you
• Drink a glass of water

**Next Steps:**
• What's the ONE most urgent thing?
• Can anything be postponed or delegated?
• What support do you need right now?

**Remember**: You don't have to solve everything at once. Let's focus on just the next small step.

What feels most manageable to address first?"
        .to_string()
}

pub fn anxiety() -> String {
    "It sounds like worry is taking up a lot of space right now. That's exhausting, and it makes sense to want some relief.

**Calm the Body:**
• Box Breathing: in 4s, hold 4s, out 4s, hold 4s
• 5-4-3-2-1 Grounding: name what you see, feel, hear, smell, taste

**Calm the Mind:**
• Write the worry down and ask what is actually in your control
• Set a short \"worry time\" later today and park the rest until then

Would you like to try a breathing exercise together, or talk through what's on your mind?"
        .to_string()
}

/// Exam stress that is spilling into sleep.
pub fn exam_and_sleep() -> String {
    "I understand you're dealing with exam stress that's affecting your sleep. This is a common pattern during intense study periods.

**Immediate Support:**
• **Study Planning**: Break your studying into 25-minute focused sessions with 5-minute breaks
• **Sleep Routine**: Try the 4-7-8 breathing technique before bed (breathe in 4s, hold 7s, out 8s)
• **Peer Connection**: Would you like me to connect you with other students managing exam stress?

**Remember**: Your worth isn't defined by your exam results. Many successful people struggled during exam periods."
        .to_string()
}

pub fn general_support(message: &str) -> String {
    format!(
        "Thank you for sharing: \"{}\".

I want to make sure I understand exactly what would help you most right now.

Are you looking for:
• **Immediate coping techniques** to feel calmer?
• **Study/sleep strategies** specifically for exam period?
• **Connection** with peers or support groups?
• **Professional resources** for ongoing support?

Please tell me what type of support would be most helpful at this moment.",
        message.trim()
    )
}

/// Response built around the selector's top-ranked technique.
pub fn from_plan(plan: &InterventionPlan, suggest_peers: bool) -> Option<String> {
    let top = plan.techniques.first()?;
    let mut out = format!("Thank you for telling me how you're feeling. One thing that may help right now is **{}**.\n", top);
    if let Some(how) = plan.resources.iter().find(|r| r.starts_with(top.as_str())) {
        out.push_str(&format!("\n• {}\n", how));
    }
    let others: Vec<&str> = plan.techniques.iter().skip(1).map(String::as_str).collect();
    if !others.is_empty() {
        out.push_str(&format!("\nOther options: {}.\n", others.join(", ")));
    }
    if suggest_peers {
        out.push_str(
            "\nYou don't have to handle this on your own. Would you like me to connect you with a peer supporter who has been through something similar?\n",
        );
    }
    out.push_str("\nWould you like to try it together now?");
    Some(out)
}

pub const SUPPORT_LINES: [&str; 5] = [
    "I hear you're going through a tough time. You're not alone in this.",
    "It takes courage to reach out for support. I'm here to listen.",
    "Thank you for sharing what you're experiencing. Let's work through this together.",
    "I understand this is challenging. What would be most helpful for you right now?",
    "You've taken an important step by reaching out. Let's explore how I can support you.",
];

pub const ENCOURAGEMENT_LINES: [&str; 5] = [
    "You're doing better than you think. Keep going!",
    "Progress isn't always linear - every small step counts.",
    "Remember how far you've come, not just how far you have to go.",
    "You have strengths you might not even recognize yet.",
    "Be kind to yourself today. You're doing the best you can.",
];

pub const GENERAL_LINES: [&str; 5] = [
    "I'm here to support you. How can I help today?",
    "Thank you for reaching out. What's on your mind?",
    "I'm listening. Tell me more about what you're experiencing.",
    "Let's work together to find the support you need.",
    "I'm here to help you navigate this. What would you like to focus on?",
];

pub const CHAT_ERROR: &str =
    "I apologize, but I'm having trouble processing your message right now. Please try again.";

pub fn candidates(message_type: ChatMessageType) -> &'static [&'static str] {
    match message_type {
        ChatMessageType::SupportRequest => &SUPPORT_LINES,
        ChatMessageType::Encouragement => &ENCOURAGEMENT_LINES,
        ChatMessageType::Text => &GENERAL_LINES,
    }
}

/// A random line for the message type; `None` only if a candidate table is empty.
pub fn peer_line(message_type: ChatMessageType) -> Option<&'static str> {
    candidates(message_type).choose(&mut rand::thread_rng()).copied()
}
