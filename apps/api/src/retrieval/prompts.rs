// Prompts for the free-text match analysis.

pub const MATCH_SYSTEM: &str = "You are a recruiting assistant. \
    You compare a candidate profile with job offers and explain which offers fit best and why.";

pub const MATCH_PROMPT: &str = "Candidate profile:
{cv_text}

Matching job offers:
{offers}

Analyze the most relevant matches between this profile and the offers.";
