pub const MODEL_API_KEY_ENV_NAME: &str = "GAPSCRIBE_MODEL_API_KEY";

pub(crate) const THINK_STRIPPER: &str = r"<think>[\s\S]*</think>\s*";

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (compatible; GapscribeBot/0.1)";

/// Tried in order after `/sitemap.xml` while no sitemap has been found.
pub(crate) const SITEMAP_FALLBACK_PATHS: &[&str] = &[
    "/sitemap_index.xml",
    "/sitemap-index.xml",
    "/wp-sitemap.xml",
    "/sitemap1.xml",
    "/post-sitemap.xml",
    "/page-sitemap.xml",
    "/blog-sitemap.xml",
    "/sitemap/sitemap.xml",
];

/// Path segments that mark a page as navigation, account or legal rather than content.
pub(crate) const NON_CONTENT_SEGMENTS: &[&str] = &[
    "login",
    "log-in",
    "signin",
    "sign-in",
    "signup",
    "sign-up",
    "register",
    "pricing",
    "plans",
    "terms",
    "terms-of-service",
    "terms-and-conditions",
    "tos",
    "privacy",
    "privacy-policy",
    "cookie-policy",
    "legal",
    "account",
    "my-account",
    "cart",
    "checkout",
    "tag",
    "tags",
    "category",
    "categories",
    "author",
    "page",
    "feed",
    "rss",
    "wp-admin",
    "wp-content",
    "wp-includes",
    "wp-json",
    "cdn-cgi",
    ".well-known",
    "search",
    "contact",
    "contact-us",
    "thank-you",
];

pub(crate) const NON_CONTENT_EXTENSIONS: &[&str] = &[
    ".xml", ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".css", ".js", ".zip",
    ".mp4", ".json",
];

pub(crate) const FOREIGN_LANGUAGE_CODES: &[&str] = &[
    "pt", "br", "es", "de", "fr", "it", "nl", "ja", "jp", "ko", "kr", "zh", "cn", "ru", "ar",
    "pl", "tr", "sv", "da", "fi", "no", "cs", "hu", "ro", "el", "he", "vi", "th", "id",
    "ms", "hi", "ptbr",
];

/// Localized resource directories that replace `/resources/` on translated sites.
pub(crate) const FOREIGN_PATH_MARKERS: &[&str] = &[
    "/recursos/",
    "/ressources/",
    "/ressourcen/",
    "/risorse/",
    "/blog-pt/",
    "/blog-es/",
    "/blog-de/",
    "/blog-fr/",
];

/// Segments never used as the source of a keyword phrase.
pub(crate) const SKIP_SLUG_SEGMENTS: &[&str] = &[
    "tag",
    "category",
    "author",
    "page",
    "wp-content",
    "assets",
    "static",
    "images",
    "img",
    "css",
    "js",
    "api",
    "admin",
    "login",
    "search",
    "feed",
    "rss",
    "sitemap",
    "robots",
    "favicon",
    "cdn",
    "media",
    "uploads",
    "files",
    "download",
    "attachment",
];

pub(crate) const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were",
];

/// Single-word slugs accepted even when shorter than the single-word minimum.
pub(crate) const VALUABLE_SINGLE_WORDS: &[&str] = &[
    "generator",
    "alternative",
    "comparison",
    "tutorial",
    "guide",
    "software",
    "tool",
    "review",
    "template",
    "recorder",
    "maker",
    "creator",
    "builder",
    "editor",
    "converter",
    "downloader",
];

/// Phrases and words that mark text as machine written, with the text that
/// replaces them. An empty replacement removes the phrase.
pub const BANNED_PHRASES: &[(&str, &str)] = &[
    ("in today's digital age", ""),
    ("in today's fast-paced world", ""),
    ("in today's fast-paced environment", ""),
    ("in today's fast-paced", ""),
    ("in today's world", ""),
    ("in this comprehensive guide", ""),
    ("in this blog post", ""),
    ("in this article", ""),
    ("let's dive in", ""),
    ("let's dive into", ""),
    ("let's explore", ""),
    ("let's delve into", ""),
    ("it's worth noting that", ""),
    ("it's worth noting", ""),
    ("it's important to note that", ""),
    ("it's important to note", ""),
    ("when it comes to", "for"),
    ("at the end of the day", ""),
    ("first and foremost", "first"),
    ("last but not least", "finally"),
    ("without further ado", ""),
    ("in conclusion", ""),
    ("to summarize", ""),
    ("moving forward", ""),
    ("going forward", ""),
    ("as we've discussed", ""),
    ("as we discussed", ""),
    ("as we've seen", ""),
    ("as we mentioned", ""),
    ("a plethora of", "plenty of"),
    ("a myriad of", "many"),
    ("paradigm shift", "big change"),
    ("game-changer", "big change"),
    ("game changer", "big change"),
    ("cutting-edge", "modern"),
    ("leverage", "use"),
    ("leveraging", "using"),
    ("utilize", "use"),
    ("utilizing", "using"),
    ("optimal", "best"),
    ("streamline", "simplify"),
    ("robust", "solid"),
    ("synergy", "teamwork"),
    ("holistic", "complete"),
    ("revolutionize", "change"),
    ("empower", "help"),
    ("delve", "dig"),
    ("realm", "area"),
    ("landscape", "field"),
    ("tapestry", "mix"),
    ("multifaceted", "varied"),
    ("plethora", "lot"),
    ("moreover", "also"),
    ("furthermore", "also"),
    ("additionally", "also"),
    ("consequently", "so"),
    ("nevertheless", "still"),
    ("nonetheless", "still"),
    ("henceforth", "from now on"),
    ("thereby", "so"),
];

/// Em and en dashes are banned outright.
pub const BANNED_DASHES: &[char] = &['\u{2014}', '\u{2013}'];

/// British spellings rewritten by the local spell-check pass.
pub(crate) const AMERICAN_SPELLINGS: &[(&str, &str)] = &[
    ("colour", "color"),
    ("colours", "colors"),
    ("favour", "favor"),
    ("favourite", "favorite"),
    ("behaviour", "behavior"),
    ("behaviours", "behaviors"),
    ("organise", "organize"),
    ("organised", "organized"),
    ("organisation", "organization"),
    ("organisations", "organizations"),
    ("optimise", "optimize"),
    ("optimised", "optimized"),
    ("optimising", "optimizing"),
    ("optimisation", "optimization"),
    ("analyse", "analyze"),
    ("analysed", "analyzed"),
    ("recognise", "recognize"),
    ("customise", "customize"),
    ("customised", "customized"),
    ("prioritise", "prioritize"),
    ("summarise", "summarize"),
    ("centre", "center"),
    ("centres", "centers"),
    ("licence", "license"),
    ("catalogue", "catalog"),
    ("travelling", "traveling"),
    ("modelling", "modeling"),
    ("labelled", "labeled"),
    ("cancelled", "canceled"),
    ("programme", "program"),
    ("defence", "defense"),
];

pub(crate) const DEFAULT_STYLE_INSTRUCTIONS: &str = "\
- Tone: Professional but approachable
- Voice: Second person (you/your)
- Paragraphs: Medium length (3-5 sentences)
- Use clear H2/H3 headers
- Moderate use of bullets and bold
- Natural, contextual internal links";

pub(crate) const DOMAIN_RESOLUTION_PROMPT: &str = r#"Find the official primary website domain for each of these companies.
Return ONLY the main English website domain (not localized versions like .de, .fr, etc.).

Companies:
{names}

Return your response as a JSON object with company names as keys and domains as values.
Example format:
{"Company Name": "companydomain.com", "Another Company": "anotherdomain.io"}

Only return the domain (e.g. "example.com"), not full URLs. Return ONLY the JSON, no explanation."#;

pub(crate) const SUBDOMAIN_PROMPT: &str = r#"What are the common content subdomains for {domain}?
Consider subdomains like blog.{domain}, docs.{domain}, help.{domain}, support.{domain}.

Return ONLY a JSON array of subdomains that likely exist for this company.
Example: ["blog.example.com", "docs.example.com"]"#;

pub(crate) const KEYWORD_PROMPT: &str = r#"Review these URL slug candidates from {source}'s website and turn them into blog/content keywords.

Candidates (index. slug => draft phrase):
{candidates}

For each candidate decide:
1. Does the phrase read as a meaningful English keyword or topic? Reject IDs, dates, pagination artifacts, gibberish, product/pricing/about/login pages and non-English slugs.
2. Normalize casing and spacing (2-6 words, hyphens become spaces).
3. The content type: Blog, Tool, Comparison, Alternative, HowTo, Listicle or Guide.
4. A relevance score 1-10 (10 = highly valuable for SEO).

Return ONLY a JSON array, one object per candidate:
[{"index": 1, "keyword": "Video Editing Tips", "type": "Blog", "score": 8, "valid": true}]"#;

pub(crate) const STYLE_PROMPT: &str = r#"Analyze this company's content and extract their writing style characteristics.

Sample Content:
{samples}

Return ONLY a JSON object with these string fields:
"tone", "voice", "sentence_structure", "paragraph_length", "use_of_headers",
"formatting_style", "cta_style", "opening_pattern", "closing_pattern",
and "unique_phrases" (an array of phrases they commonly use)."#;

pub(crate) const LINK_MAP_PROMPT: &str = r#"Analyze these URLs and extract the main topic each page is about, for internal linking.

URLs:
{urls}

For each URL give 1-3 short anchor phrases that describe the page.
Return ONLY a JSON object mapping URLs to arrays of anchor phrases:
{"https://example.com/blog/video-tools": ["video tools", "screen recording"]}"#;

pub(crate) const PRODUCT_PROMPT: &str = r#"Summarize the product described by these company pages in one paragraph: product name, what it does, key features, target audience and main use cases.

Content:
{samples}

Return only the paragraph."#;

pub(crate) const DRAFT_PROMPT: &str = r#"You are a senior content writer for {company}. Write a comprehensive, high-quality blog post.

=== TARGET KEYWORD ===
Keyword: {keyword}
Content Type: {content_type}
Competitors covering this: {competitors}

=== COMPANY CONTEXT ===
Company: {company}
{product}

=== WRITING STYLE (Follow Exactly) ===
{style}

=== INTERNAL LINKING OPPORTUNITIES ===
{links}

=== REQUIREMENTS ===
1. LENGTH: Minimum {min_words} words. Every section must be detailed and substantive.
2. LANGUAGE: American English only, correct spelling.
3. DATES: The current year is {year}. Never present an older year as the current one.
4. NO AI MARKERS: never use em dashes or en dashes, and never use any of these phrases or words:
{banned}
5. HUMAN STYLE: natural contractions, varied sentence length, direct and practical, address the reader as "you".
6. STRUCTURE: a compelling H1 title, an introduction that starts with a specific problem, 6-8 H2 sections, a Key Takeaways section and a Frequently Asked Questions section with 5 questions.
7. INTERNAL LINKS: only link to the URLs listed above, using Markdown [anchor text](URL).

=== OUTPUT FORMAT ===
TITLE: [title]

META_DESCRIPTION: [150-160 character SEO meta description]

CONTENT:
[Full blog content in Markdown]"#;

pub(crate) const EXPAND_PROMPT: &str = r#"The following blog about "{keyword}" is too short ({word_count} words).
Expand it to at least {min_words} words while preserving its structure, headings and tone.
Add more detailed explanations, examples, practical tips and H3 subsections.
Do not use dashes or AI-sounding phrases.

Return only the expanded content in Markdown.

Current content:
{content}"#;

pub(crate) const SPELLCHECK_PROMPT: &str = r#"Fix any spelling errors in this content.

RULES:
- Only fix obvious spelling mistakes
- Use American English spellings
- Do not change grammar, style, formatting or links
- Do not add or remove content
- Return the corrected content only

CONTENT:
{content}"#;
