//! Answer used when the generation backend is unavailable.

/// Deterministic reply that echoes the question and the patient context and
/// points the user at manual next steps. It never inspects the question's
/// wording.
pub fn fallback_response(question: &str, patient_context: &str) -> String {
    format!(
        "I understand you're asking about: \"{question}\"\n\n\
         Based on your profile information:\n{patient_context}\n\n\
         I'm currently running in limited mode without the full AI model, so I can't give a \
         personalized medical answer right now. Here are some steps you can take:\n\
         1. Consult with a healthcare professional about your question\n\
         2. Upload your medical reports for better tracking\n\
         3. Use the lifestyle tracking features to monitor your health trends\n\
         4. Schedule appointments with your healthcare providers\n\n\
         Is there anything specific about your health data you'd like me to help you review?"
    )
}

/// Reply used when the pipeline itself failed.
pub fn error_response(question: &str) -> String {
    format!(
        "I apologize, but I encountered an error while processing your question: \"{question}\". \
         Please try again in a moment, and consult a healthcare professional if your concern is urgent."
    )
}
