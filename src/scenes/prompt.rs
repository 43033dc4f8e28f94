/// Instruction sent alongside the video for the scene breakdown
pub const VIDEO_ANALYSIS_PROMPT: &str = r#"
Analyze the following video and provide a detailed scene-by-scene breakdown. For each scene:

1. Identify the start and end times in seconds
2. Provide a detailed description of what's happening
3. List key visual elements (people, objects, settings, etc.)
4. List key audio elements (music, speech, sound effects, etc.)
5. Describe the mood/atmosphere
6. List main actions or events

Guidelines:
- Break down the video into logical scenes based on content changes
- Scenes must not overlap and must follow chronological order
- Be specific and detailed in descriptions
- Focus on the most important elements in each scene
- Consider both visual and audio elements
- Note any significant transitions or changes

Finish with a brief summary of the whole video. Respond only with JSON that follows the
provided response schema.
"#;
