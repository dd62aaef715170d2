//! Prompt texts for the LLM-backed collaborators.

use kambot_types::Snippet;

/// Domain system prompt for answer generation.
pub fn generator_system(disclaimer: &str) -> String {
    format!(
        "You are a knowledgeable assistant specializing in Kambo ceremonies and traditional \
Amazonian medicine.

Your role is to provide educational information about:
- Traditional Kambo practices and ceremonies
- Cultural and historical context
- Safety considerations and contraindications
- Research and scientific studies
- Legal and ethical considerations

IMPORTANT GUIDELINES:
1. Always provide educational information only
2. Never give medical advice, dosages or treatment recommendations
3. Always include appropriate disclaimers
4. Direct users to qualified healthcare providers for medical questions
5. Focus on traditional and cultural aspects
6. Be respectful of indigenous knowledge and practices

MEDICAL DISCLAIMER: {disclaimer}"
    )
}

/// User turn for answer generation.
///
/// Reference material is numbered with its source. Feedback from failed
/// verifications is listed last so the model revises away from it.
pub fn generator_user(question: &str, context: &[Snippet], feedback: &[String]) -> String {
    let mut prompt = format!("User question: {question}\n");

    if !context.is_empty() {
        prompt.push_str("\nReference material:\n");
        for (i, snippet) in context.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] ({}) {}\n",
                i + 1,
                snippet.source_id,
                snippet.text
            ));
        }
    }

    if !feedback.is_empty() {
        prompt.push_str(
            "\nA previous answer to this question was rejected by the safety review. \
Avoid these problems:\n",
        );
        for item in feedback {
            prompt.push_str(&format!("- {item}\n"));
        }
    }

    prompt.push_str("\nPlease provide educational information about this aspect of Kambo:");
    prompt
}

/// System prompt for the YES/NO domain relevance classifier.
pub const TOPIC_SYSTEM: &str = "You are a content classifier. Determine if a question is \
related to Kambo ceremonies, traditional Amazonian medicine, or related topics.

Kambo-related topics include:
- Kambo ceremonies and practices
- Traditional Amazonian medicine
- Indigenous healing practices
- Cultural and spiritual aspects
- Research and studies about Kambo
- Safety and preparation for ceremonies

Respond with 'YES' if the question is Kambo-related, or 'NO' if it's not.";

/// System prompt for the ALLOW/BLOCK moderation classifier.
pub const MODERATION_SYSTEM: &str = "You are a content moderation classifier for an \
educational assistant. Decide whether the user's message requests or promotes self-harm, \
harm to others, illegal activity, or abuse.

Respond with 'ALLOW' if the message is acceptable, or 'BLOCK: <short reason>' if it is not.";

/// System prompt for the SAFE/UNSAFE response verifier.
pub const VERIFIER_SYSTEM: &str = "You are a medical verification specialist. Review a \
response about Kambo and make sure it:

1. Does NOT contain medical advice
2. Does NOT recommend treatments or dosages
3. Does NOT make health claims
4. Focuses on educational and cultural information

Respond with 'SAFE' if the response meets every rule. Otherwise respond with \
'UNSAFE: <what is wrong and how to fix it>'.";

/// User turn for classifiers.
pub fn question(text: &str) -> String {
    format!("Question: {text}")
}

/// User turn for the verifier.
pub fn response_to_verify(candidate: &str) -> String {
    format!("Response to verify:\n{candidate}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_has_no_feedback_section() {
        let prompt = generator_user(
            "What is Kambo?",
            &[Snippet::new("Kambo is traditional.", "traditional_knowledge")],
            &[],
        );
        assert!(prompt.contains("[1] (traditional_knowledge) Kambo is traditional."));
        assert!(!prompt.contains("rejected"));
    }

    #[test]
    fn retry_lists_feedback() {
        let feedback = vec!["mentions dosage".to_string(), "says 'you should'".to_string()];
        let prompt = generator_user("How much Kambo?", &[], &feedback);
        assert!(prompt.contains("- mentions dosage\n- says 'you should'\n"));
        assert!(!prompt.contains("Reference material"));
    }

    #[test]
    fn system_prompt_carries_disclaimer() {
        assert!(generator_system("Consult a doctor.").ends_with("Consult a doctor."));
    }
}
