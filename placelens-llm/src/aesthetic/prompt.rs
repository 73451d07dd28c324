pub(crate) const MODERNITY_PROMPT: &str = "\
Analyze the aesthetic of the website in the attached screenshot and classify its design as exactly one of: 'Modern', 'Acceptable', or 'Outdated'. Then give a one or two sentence explanation that names specific visual elements.

Definitions (2025 web design standards):
- Modern: highly professional and contemporary. Effective white space, modern typography with varied weights, a cohesive color scheme, high-quality imagery, contemporary UI elements (hover effects, gradients, subtle animation) and clear signs of responsive layout.
- Acceptable: functional and professional. Clean organized layout, legible typography, cohesive colors and some professional elements, but without advanced modern trends. Not significantly dated.
- Outdated: visually dated, resembling early 2000s or 2010s sites. Cluttered or overly basic layout, low-quality or pixelated images, clashing or dated colors, poor typography, an unprofessional overall impression.

Evaluate white space and UI elements, image quality, color scheme, typography, layout and hierarchy, responsiveness indicators, and the overall impression.

Only choose 'Outdated' when the site has significant flaws such as a cluttered layout, clashing colors or pixelated images. A professional site that merely lacks modern flourishes is 'Acceptable'.

Format your response EXACTLY as:
Category: [Modern, Acceptable, or Outdated]
Explanation: [Your brief explanation, naming at least one specific visual element]
";

pub(crate) const BEAUTY_PROMPT: &str = "\
Judge the visual beauty of the website in the attached screenshot and classify it as exactly one of: 'Beautiful', 'Passable', or 'Ugly'. Then give a one or two sentence explanation that names specific visual elements.

Definitions (2025 web design standards):
- Beautiful: polished and striking. Balanced composition, generous white space, refined typography, a harmonious palette and high-quality imagery.
- Passable: tidy and usable. Nothing offensive to the eye, but plain or generic, with few memorable design choices.
- Ugly: unpleasant to look at. Cluttered composition, clashing colors, pixelated or stretched images, inconsistent or poor typography, an unprofessional or dated look.

Only choose 'Ugly' when the site has clear visual flaws. A clean but plain site is 'Passable'.

Format your response EXACTLY as:
Category: [Beautiful, Passable, or Ugly]
Explanation: [Your brief explanation, naming at least one specific visual element]
";
