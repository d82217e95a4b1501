//! System prompt for the model-backed classification stage.

pub const CLASSIFY_SYSTEM_PROMPT: &str = "You classify a user's message into exactly one of \
three categories: RAG, GENERAL, or TOOL.\n\
- RAG: the user is asking about information that would be found in indexed documents \
(policies, terms, manuals).\n\
- TOOL: the user wants an action performed or live data fetched (e.g. listing events).\n\
- GENERAL: anything else, including greetings, small talk, and open-ended questions.\n\n\
Respond with ONLY one word: RAG, GENERAL, or TOOL.";
