//! Prompt rendering for the completion model

/// Output shape shown to the model
pub const OUTPUT_EXAMPLE: &str = r#"{"prohibited_in": ["IN"], "restricted_in": ["CN"]}"#;

/// Render the fixed instruction around the user query and projected context.
///
/// No truncation happens here; `context` is already bounded by the projector.
pub fn build(user_query: &str, context: &str) -> String {
    format!(
        "A user wants trade regulation details on: **{user_query}**\n\
         \n\
         Using the provided data, return:\n\
         - **Prohibited countries** (ISO2 codes)\n\
         - **Restricted countries** (ISO2 codes)\n\
         \n\
         **Relevant Data:**\n\
         {context}\n\
         \n\
         **Output must be in structured JSON format like this: {OUTPUT_EXAMPLE}**\n\
         \n\
         *No markdown, just plaintext*\n"
    )
}
