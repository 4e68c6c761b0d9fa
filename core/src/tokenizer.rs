use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\b\w\w+\b").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","across","after","afterwards","again","against","all","almost","alone","along","already","also","although","always","am","among","amongst","amoungst","amount","an","and","another","any","anyhow","anyone","anything","anyway","anywhere","are","around","as","at",
            "back","be","became","because","become","becomes","becoming","been","before","beforehand","behind","being","below","beside","besides","between","beyond","bill","both","bottom","but","by",
            "call","can","cannot","cant","co","con","could","couldnt","cry",
            "de","describe","detail","do","done","down","due","during",
            "each","eg","eight","either","eleven","else","elsewhere","empty","enough","etc","even","ever","every","everyone","everything","everywhere","except",
            "few","fifteen","fifty","fill","find","fire","first","five","for","former","formerly","forty","found","four","from","front","full","further",
            "get","give","go",
            "had","has","hasnt","have","he","hence","her","here","hereafter","hereby","herein","hereupon","hers","herself","him","himself","his","how","however","hundred",
            "i","ie","if","in","inc","indeed","interest","into","is","it","its","itself",
            "keep","last","latter","latterly","least","less","ltd",
            "made","many","may","me","meanwhile","might","mill","mine","more","moreover","most","mostly","move","much","must","my","myself",
            "name","namely","neither","never","nevertheless","next","nine","no","nobody","none","noone","nor","not","nothing","now","nowhere",
            "of","off","often","on","once","one","only","onto","or","other","others","otherwise","our","ours","ourselves","out","over","own",
            "part","per","perhaps","please","put","rather","re",
            "same","see","seem","seemed","seeming","seems","serious","several","she","should","show","side","since","sincere","six","sixty","so","some","somehow","someone","something","sometime","sometimes","somewhere","still","such","system",
            "take","ten","than","that","the","their","them","themselves","then","thence","there","thereafter","thereby","therefore","therein","thereupon","these","they","thick","thin","third","this","those","though","three","through","throughout","thru","thus","to","together","too","top","toward","towards","twelve","twenty","two",
            "un","under","until","up","upon","us",
            "very","via",
            "was","we","well","were","what","whatever","when","whence","whenever","where","whereafter","whereas","whereby","wherein","whereupon","wherever","whether","which","while","whither","who","whoever","whole","whom","whose","why","will","with","within","without","would",
            "yet","you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text using NFKC normalization, lowercase and stopword removal.
/// Tokens are runs of at least two word characters; `stem` applies the
/// English Snowball stemmer to each survivor.
pub fn tokenize(text: &str, stem: bool) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for mat in RE.find_iter(&normalized) {
        let token = mat.as_str();
        if is_stopword(token) { continue; }
        if stem {
            tokens.push(STEMMER.stem(token).into_owned());
        } else {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Unigrams followed by n-grams up to `ngram_max`, joined with a single space.
pub fn ngrams(tokens: &[String], ngram_max: usize) -> Vec<String> {
    let mut terms: Vec<String> = tokens.to_vec();
    for n in 2..=ngram_max.max(1) {
        if tokens.len() < n { break; }
        terms.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    terms
}

/// Analyze several fields into one term sequence. N-grams never span two
/// fields, so the end of a name is not adjacent to the start of its description.
pub fn analyze<'a, I>(fields: I, ngram_max: usize, stem: bool) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut terms = Vec::new();
    for field in fields {
        terms.extend(ngrams(&tokenize(field, stem), ngram_max));
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!", true);
        assert!(t.iter().any(|w| w == "run"));
    }

    #[test]
    fn drops_single_characters() {
        let t = tokenize("a b cd 7 42", false);
        assert_eq!(t, vec!["cd".to_string(), "42".to_string()]);
    }

    #[test]
    fn bigrams_follow_unigrams() {
        let t = analyze(["stone temple ruins"], 2, false);
        assert_eq!(t, vec!["stone", "temple", "ruins", "stone temple", "temple ruins"]);
    }

    #[test]
    fn bigrams_do_not_cross_fields() {
        let t = analyze(["Ancient Temple", "stone ruins"], 2, false);
        assert!(t.contains(&"ancient temple".to_string()));
        assert!(t.contains(&"stone ruins".to_string()));
        assert!(!t.contains(&"temple stone".to_string()));
    }
}
