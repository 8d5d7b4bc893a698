// All LLM prompt constants for the CV workflow.
// Every stage has a full-job variant and a description-only variant; the
// description-only variants never take title, company, category, or role.

/// Fills `{name}` placeholders in a single pass. Substituted values are never
/// re-scanned, so job text containing braces is inserted verbatim. Unknown
/// placeholders are left as they are.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

// ── Requirement extraction ──────────────────────────────────────────────────

pub const EXTRACT_SYSTEM: &str = "You are an expert job analyst. Extract key requirements from job postings.

Return a JSON object with these fields:
- required_skills: List of technical skills mentioned
- soft_skills: List of soft skills mentioned
- experience_level: Entry/Mid/Senior level
- education_requirements: Degree requirements
- key_responsibilities: Main job duties
- industry_keywords: Industry-specific terms
- company_culture: Work environment indicators";

pub const EXTRACT_PROMPT: &str = "Analyze this job posting and extract requirements:

Job Title: {title}
Company: {company}
Description: {description}
Job Category: {job_category}
Role: {role}

Extract the key requirements in JSON format.";

pub const EXTRACT_SYSTEM_DESCRIPTION_ONLY: &str = "You are an expert job analyst. Use ONLY the provided job description.

Return a JSON object with these fields:
- required_skills: List of technical skills mentioned
- soft_skills: List of soft skills mentioned
- experience_level: Entry/Mid/Senior level (if inferable)
- education_requirements: Degree requirements (if stated)
- key_responsibilities: Main job duties
- industry_keywords: Industry-specific terms
- company_culture: Work environment indicators
If a field is not supported by the description, return an empty list or empty string for that field.";

pub const EXTRACT_PROMPT_DESCRIPTION_ONLY: &str = "Analyze this job description and extract requirements:

Description: {description}

Extract the key requirements in JSON format.";

// ── Specificity validation ──────────────────────────────────────────────────

pub const VALIDATOR_SYSTEM: &str = "You are a validator. Decide if these extracted job requirements are sufficiently specific to generate a targeted CV.
Output strict JSON: {\"sufficient\": true|false, \"reason\": \"...\"}.
Consider skills breadth, responsibilities clarity, seniority, and education requirements.";

pub const VALIDATOR_PROMPT: &str = "Extracted Requirements (JSON):
{requirements_json}

Are these sufficient to generate a targeted CV? Respond with JSON only.";

// ── Experience ──────────────────────────────────────────────────────────────

pub const EXPERIENCE_SYSTEM: &str = "You are a professional resume writer. Create a work experience section that matches job requirements.

Generate 2-3 relevant work experiences with:
- Job titles that align with the target role
- Company names (realistic but fictional)
- 3-4 bullet points per role with quantified achievements
- Skills and technologies that match the job requirements";

pub const EXPERIENCE_PROMPT: &str = "Create work experience for someone applying to this job:

Target Job: {title} at {company}
Required Skills: {skills}
Experience Level: {level}
Key Responsibilities: {responsibilities}

Generate realistic work experience that shows progression and relevant achievements.";

pub const EXPERIENCE_SYSTEM_DESCRIPTION_ONLY: &str = "You are a professional resume writer. Create work experience based ONLY on the provided description and extracted requirements.
Generate 2-3 relevant roles with quantified bullets and matching skills.
Do not assume title/company beyond what the description implies.";

pub const EXPERIENCE_PROMPT_DESCRIPTION_ONLY: &str = "Create work experience for this job description:

Description: {description}
Required Skills: {skills}
Experience Level: {level}
Key Responsibilities: {responsibilities}

Generate realistic work experience that shows progression and relevant achievements.";

// ── Skills ──────────────────────────────────────────────────────────────────

pub const SKILLS_SYSTEM: &str = "You are a professional resume writer. Create a skills section that matches job requirements.

Organize skills into categories:
- Technical Skills: Programming languages, tools, technologies
- Soft Skills: Communication, leadership, etc.
- Industry Knowledge: Domain-specific knowledge

Include proficiency levels where appropriate (Beginner/Intermediate/Advanced/Expert).

IMPORTANT: If the job description isn't specific enough about required skills, rely on your general knowledge about:
- The specific job title and what skills are typically required
- The company type and industry to infer relevant skills
- Common skills for similar roles in that industry";

pub const SKILLS_PROMPT: &str = "Create a skills section for someone applying to this job:

Job Title: {title}
Company: {company}
Job Category: {job_category}
Job Description: {description}

Required Technical Skills: {tech_skills}
Required Soft Skills: {soft_skills}
Industry Keywords: {industry}

Generate a comprehensive skills section that matches these requirements. If the description lacks specific skill details, use your knowledge of typical requirements for this job title and company type.";

pub const SKILLS_SYSTEM_DESCRIPTION_ONLY: &str = "You are a professional resume writer. Create a skills section using ONLY the provided description and extracted requirements.
Organize into Technical, Soft, and Industry Knowledge; include proficiency where appropriate.
Do not use title/company/category that aren't in the description.";

pub const SKILLS_PROMPT_DESCRIPTION_ONLY: &str = "Create a skills section for this description:

Job Description: {description}

Required Technical Skills: {tech_skills}
Required Soft Skills: {soft_skills}
Industry Keywords: {industry}";

// ── Education ───────────────────────────────────────────────────────────────

pub const EDUCATION_SYSTEM: &str = "You are a professional resume writer. Create an education section that matches job requirements.

Include:
- Relevant degree(s) and institutions
- Graduation years
- Relevant coursework
- Academic achievements (GPA, honors, etc.)
- Certifications if relevant";

pub const EDUCATION_PROMPT: &str = "Create an education section for someone applying to this job:

Job Title: {title}
Education Requirements: {education_req}
Required Skills: {skills}
Industry: {industry}

Generate realistic education background that supports the candidate's qualifications.";

pub const EDUCATION_SYSTEM_DESCRIPTION_ONLY: &str = "You are a professional resume writer. Create an education section based ONLY on description and extracted requirements.
Include relevant degrees, coursework, achievements, and certifications if supported.";

pub const EDUCATION_PROMPT_DESCRIPTION_ONLY: &str = "Create an education section for this job description:

Job Description: {description}
Education Requirements: {education_req}
Required Skills: {skills}
Industry: {industry}";

// ── Compilation ─────────────────────────────────────────────────────────────

pub const COMPILE_SYSTEM: &str = "You are a professional resume formatter. Create a well-formatted CV.

Format the CV with:
- Clear section headers
- Consistent formatting
- Professional appearance
- Easy to read layout
- Proper spacing and alignment";

pub const COMPILE_PROMPT: &str = "Compile this CV for the position of {title} at {company}:

Work Experience:
{experience}

Skills:
{skills}

Education:
{education}

Format this into a professional, well-structured CV.";

pub const COMPILE_SYSTEM_DESCRIPTION_ONLY: &str = "You are a professional resume formatter. Create a well-formatted CV.
Use ONLY the provided sections; do not add title/company not present in description.
Keep clear headers and professional layout.";

pub const COMPILE_PROMPT_DESCRIPTION_ONLY: &str = "Compile this CV based on the sections below:

Work Experience:
{experience}

Skills:
{skills}

Education:
{education}

Format this into a professional, well-structured CV.";
