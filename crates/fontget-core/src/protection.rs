//! Critical system font protection
//!
//! Names are compared after [`normalize_font_name`], so "Segoe UI",
//! "segoe-ui" and "SegoeUI" all hit the same entry. Export and backup never
//! include these families, and removal refuses to touch them.

const WINDOWS_SYSTEM_FONTS: &[&str] = &[
    "segoeui", "segoeuibold", "segoeuiitalic", "segoeuibolditalic", "segoeuivariable",
    "microsoftsansserif", "tahoma", "mssansserif", "marlett", "segoefluenticons",
    "segoemdl2assets", "segoeuisymbol", "wingdings", "wingdings2", "wingdings3", "webdings",
    "symbol", "arial", "arialbold", "arialitalic", "arialbolditalic", "arialblack", "times",
    "timesnewroman", "timesnewromanpsmt", "courier", "couriernew", "verdana", "trebuchetms",
    "trebuchetmsbold", "trebuchetmsitalic", "trebuchetmsbolditalic", "georgia", "georgiabold",
    "georgiaitalic", "georgiabolditalic", "calibri", "calibribold", "calibriitalic",
    "calibribolditalic", "cambria", "candara", "consolas", "constantia", "corbel",
    "lucidaconsole", "segoeuiemoji", "meiryo", "yugothic", "msgothic", "msmincho", "simsun",
    "simhei", "mingliub", "pmingliu", "malgungothic", "gulim", "batang", "msjh", "msjhbd",
    "msjhl", "msyh", "msyhbd", "msyhl", "cambriamath", "framd", "msgothicui", "msuigothic",
    "seguisb", "seguili", "seguisl", "arialunicode", "comicsansms", "comicsansmsbold", "impact",
    "palatino", "palatinolinotype", "bookantiqua", "centurygothic", "franklingothic", "gillsans",
    "gillsansmt", "garamond", "garamonditalic", "garamondbold", "garamondbolditalic",
];

const MACOS_SYSTEM_FONTS: &[&str] = &[
    "sfpro", "sfprodisplay", "sfprotext", "sfprorounded", "sfcompact", "sfmono", "sanfrancisco",
    "sfnsdisplay", "sfnsrounded", "sfnstext", "systemfont", "sfarabic", "sfarmenian", "sfhebrew",
    "sfsymbols", "helvetica", "helveticaneue", "lucidagrande", "geneva", "monaco", "menlo",
    "chicago", "arial", "arialblack", "times", "timesnewroman", "courier", "couriernew",
    "palatino", "baskerville", "optima", "optimabold", "optimaitalic", "optimabolditalic",
    "didot", "americantypewriter", "hoeflertext", "applecoloremoji", "applesymbols",
    "hiraginosans", "hiraginomincho", "pingfangsc", "pingfangtc", "heitisc", "heititc",
    "songtisc", "songtitc", "applesdgothicneo", "osaka", "stixgeneral", "stixsizeonesym",
    "stixsizetwosym", "stixsizethreesym", "stixsizefoursym", "applebraille", "lastresort",
    "cambria", "bookantiqua", "centurygothic", "trebuchetms", "verdana", "georgia",
    "comicsansms", "impact", "tahoma", "myriad", "myriadpro", "myriadset", "myriadsemibold",
    "myriadsemibolditalic", "athelas", "seravek", "seraveklight", "seravekmedium",
    "seraveksemibold", "seravekbold", "applegaramond", "garamond", "garamonditalic",
    "garamondbold", "garamondbolditalic", "futura", "futurabold", "futuraitalic",
    "futurabolditalic",
];

// Catalog fonts that some distros also ship (Fira Code, Hack) stay
// installable and exportable, so they are not listed here.
const LINUX_SYSTEM_FONTS: &[&str] = &[
    "ubuntu", "ubuntumono", "ubuntubold", "ubuntuitalic", "ubuntubolditalic", "dejavusans",
    "dejavusansmono", "dejavuserif", "cantarell", "cantarellbold", "cantarellitalic",
    "cantarellbolditalic", "symbola", "liberationsans", "liberationserif", "liberationmono",
    "notosans", "notoserif", "notosansmono", "notocoloremoji", "terminus", "firafonts",
    "firamonospace",
];

/// Lower-case and drop spaces, hyphens and underscores
pub fn normalize_font_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Strip a trailing font extension so filenames can be checked too
fn strip_font_extension(name: &str) -> &str {
    let path = std::path::Path::new(name);
    if crate::validation::is_valid_font_extension(path) {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            return stem;
        }
    }
    name
}

/// True when the family (or filename) is a critical system font on any platform
pub fn is_critical_system_font(name: &str) -> bool {
    let normalized = normalize_font_name(strip_font_extension(name));
    WINDOWS_SYSTEM_FONTS.contains(&normalized.as_str())
        || MACOS_SYSTEM_FONTS.contains(&normalized.as_str())
        || LINUX_SYSTEM_FONTS.contains(&normalized.as_str())
}
