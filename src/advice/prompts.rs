//! Fixed prompts sent to the text generation service.

use serde_json::json;

/// One topic of the structured advice: its key, display title and the
/// instruction given to the generator for filling it in.
#[derive(Debug, Clone, Copy)]
pub struct AdviceTopic {
    pub key: &'static str,
    pub title: &'static str,
    pub guidance: &'static str,
}

pub const ADVICE_TOPICS: [AdviceTopic; 13] = [
    AdviceTopic {
        key: "advice",
        title: "Supportive Advice",
        guidance: "Offer kind, helpful advice. Speak directly to the person in a supportive and human tone.",
    },
    AdviceTopic {
        key: "condition",
        title: "About This Condition",
        guidance: "Explain what this condition generally is, how it affects people, and typical signs.",
    },
    AdviceTopic {
        key: "seriousness",
        title: "How Serious Is It?",
        guidance: "Describe whether this condition is usually minor or could sometimes be more serious. Offer a calm explanation.",
    },
    AdviceTopic {
        key: "treatment_options",
        title: "Treatment Options",
        guidance: "List typical over-the-counter treatments, skincare routines, or remedies people use.",
    },
    AdviceTopic {
        key: "recommended_products",
        title: "Recommended Products",
        guidance: "Suggest common, widely available products that might help (e.g., gentle cleansers, creams, etc.).",
    },
    AdviceTopic {
        key: "habits_to_avoid",
        title: "Habits to Avoid",
        guidance: "Share daily habits or actions that could make the condition worse, and how to avoid them.",
    },
    AdviceTopic {
        key: "prevention_tips",
        title: "Prevention Tips",
        guidance: "Offer tips for preventing this condition from returning or getting worse in the future.",
    },
    AdviceTopic {
        key: "when_to_see_a_doctor",
        title: "When to See a Doctor",
        guidance: "List symptoms, warning signs, or situations when the user should definitely consult a dermatologist.",
    },
    AdviceTopic {
        key: "emotional_support",
        title: "Emotional Support",
        guidance: "Reassure the user emotionally: remind them that they are not alone and it's okay to feel concerned.",
    },
    AdviceTopic {
        key: "common_misconceptions",
        title: "Common Misconceptions",
        guidance: "Clear up popular myths or misunderstandings about this condition in simple terms.",
    },
    AdviceTopic {
        key: "lifestyle_adjustments",
        title: "Lifestyle Adjustments",
        guidance: "Offer guidance on diet, stress, sleep, or hygiene changes that might help.",
    },
    AdviceTopic {
        key: "natural_remedies",
        title: "Natural Remedies",
        guidance: "Share gentle home remedies that some people find helpful, but clarify they are not a substitute for medical care.",
    },
    AdviceTopic {
        key: "summary",
        title: "Summary",
        guidance: "Wrap everything up in a kind, encouraging message. End with this disclaimer: 'Please remember, this is not a medical diagnosis. While AI can assist, it's always best to consult a certified dermatologist for a professional opinion.'",
    },
];

/// The keys every advice response must carry, in presentation order.
pub fn expected_keys() -> impl Iterator<Item = &'static str> {
    ADVICE_TOPICS.iter().map(|topic| topic.key)
}

pub const CHAT_SYSTEM_PROMPT: &str = "You are SkinxAI, an expert AI assistant specialized only in skincare, skin health, and beauty routines. \
You should not answer any questions unrelated to skincare. \
If the user asks something outside your domain (like tech, movies, or general knowledge), you must reply with: \
'I\u{2019}m your AI skincare assistant! Let\u{2019}s talk about skin \u{1F60A}'\n\n\
Your responses should be well-structured, clear, and easy to read. Use the following guidelines:\n\
1. **Break your answers into sections** with clear, concise headings (e.g., 'Cleansing', 'Treatment', 'Lifestyle Tips').\n\
2. **Use bullet points or numbered lists** for steps or suggestions to make the content easy to follow.\n\
3. Avoid large blocks of text; keep each section short and focused.\n\
4. **Be clear and avoid technical jargon** unless necessary. Make sure the user can easily understand the advice.\n\
5. If you discuss multiple suggestions, clearly **label each step** or point (e.g., 'Step 1: Cleanse Twice a Day').\n\
6. Always end with a reminder of the importance of consistency and patience in skincare.\n\n\
Remember to always be friendly, helpful, and professional in your tone!\n\n\
If the user asks about specific products to use, provide general suggestions for types of products (e.g., cleansers, treatments, moisturizers) that are good for addressing acne or pimples. \
However, avoid naming any specific brands, and focus on the ingredients or types of products that can help.";

/// Builds the structured-advice prompt for a classified condition.
pub fn advice_prompt(condition: &str) -> String {
    let sections: Vec<_> = ADVICE_TOPICS
        .iter()
        .map(|topic| {
            json!({
                "key": topic.key,
                "title": topic.title,
                "content": topic.guidance,
            })
        })
        .collect();
    let schema = serde_json::to_string_pretty(&json!({ "sections": sections }))
        .unwrap_or_default();

    format!(
        "A user uploaded a skin image, and the AI classified it as '{condition}'.\n\n\
Please act like a compassionate assistant helping a patient understand their skin condition. \
Your role is to provide supportive, non-medical advice in a warm, friendly, and clear tone. \
The goal is to educate and reassure the user, not to diagnose or replace professional care.\n\n\
Provide the response strictly in the following JSON format:\n\n\
{schema}\n\n\
Please make sure each field is filled out clearly and thoroughly, using simple, non-technical language. \
Do not include any extra text; output only the JSON and nothing else."
    )
}
