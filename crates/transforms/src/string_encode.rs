use crate::Transform;
use crate::config::RateConfig;
use crate::util::{self, chance, in_const_context};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::{Rng, rngs::StdRng};
use shroud_core::ast::{Ast, BinOp, Node, NodeId};
use shroud_core::rewrite::Rewriter;
use shroud_utils::errors::TransformError;
use tracing::debug;

/// Attempts at finding a printable key byte before giving up on XOR.
const XOR_ATTEMPTS: usize = 16;

/// Replaces string literals with runtime decoding expressions.
pub struct StringEncoder {
    rate: u32,
}

impl StringEncoder {
    pub fn new(config: &RateConfig) -> Self {
        Self { rate: config.rate }
    }

    fn encode(&self, ast: &mut Ast, rng: &mut StdRng, value: &str) -> NodeId {
        match rng.random_range(0..4) {
            0 => {
                let payload = ast.string(&rot13(value));
                ast.call("str_rot13", vec![payload])
            }
            1 => {
                let payload = ast.string(&hex::encode(value));
                ast.call("hex2bin", vec![payload])
            }
            2 => match xor_pair(rng, value) {
                Some((masked, key)) => {
                    let l = ast.string(&masked);
                    let r = ast.string(&key);
                    ast.binary(BinOp::BitXor, l, r)
                }
                None => base64_call(ast, value),
            },
            _ => base64_call(ast, value),
        }
    }
}

fn base64_call(ast: &mut Ast, value: &str) -> NodeId {
    let payload = ast.string(&STANDARD.encode(value));
    ast.call("base64_decode", vec![payload])
}

/// ROT13 over ASCII letters; every other byte is kept.
fn rot13(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'a'..='z' => char::from((c as u8 - b'a' + 13) % 26 + b'a'),
            'A'..='Z' => char::from((c as u8 - b'A' + 13) % 26 + b'A'),
            _ => c,
        })
        .collect()
}

/// Splits printable ASCII `value` into two printable strings whose XOR is `value`.
fn xor_pair(rng: &mut StdRng, value: &str) -> Option<(String, String)> {
    let printable = |b: u8| (0x20..0x7f).contains(&b);
    if !value.bytes().all(printable) {
        return None;
    }
    let mut masked = String::with_capacity(value.len());
    let mut key = String::with_capacity(value.len());
    for byte in value.bytes() {
        let (m, k) = (0..XOR_ATTEMPTS).find_map(|_| {
            let k = rng.random_range(0x20..0x7fu8);
            let m = byte ^ k;
            printable(m).then_some((m, k))
        })?;
        masked.push(char::from(m));
        key.push(char::from(k));
    }
    Some((masked, key))
}

impl Transform for StringEncoder {
    fn name(&self) -> &'static str {
        "StringEncode"
    }

    fn apply(&self, ast: &mut Ast, rng: &mut StdRng) -> Result<bool, TransformError> {
        let mut rewriter = Rewriter::for_ast(ast);
        let literals: Vec<NodeId> = ast
            .post_order(ast.root())
            .into_iter()
            .filter(|id| matches!(&ast[*id], Node::Str { value } if !value.is_empty()))
            .filter(|id| {
                let parents = rewriter.parents();
                let in_template = parents
                    .parent(*id)
                    .is_some_and(|p| matches!(ast[p], Node::Interpolated { .. }));
                !in_template && !in_const_context(ast, parents, *id)
            })
            .collect();
        debug!(literals = literals.len(), "string literals eligible");

        for id in literals {
            if !chance(rng, self.rate) {
                continue;
            }
            let Node::Str { value } = &ast[id] else {
                continue;
            };
            let value = value.clone();
            let encoded = self.encode(ast, rng, &value);
            rewriter.request(id, encoded);
        }

        Ok(util::commit(rewriter, ast, self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn decode(ast: &Ast, id: NodeId) -> String {
        let literal = |n: NodeId| match &ast[n] {
            Node::Str { value } => value.clone(),
            other => panic!("expected string, found {}", other.kind_name()),
        };
        match &ast[id] {
            Node::FuncCall { name, args } => {
                let Node::Arg { value, .. } = ast[args[0]] else {
                    panic!("expected arg");
                };
                let payload = literal(value);
                match ast.name_of(*name).unwrap() {
                    "base64_decode" => String::from_utf8(STANDARD.decode(payload).unwrap()).unwrap(),
                    "hex2bin" => String::from_utf8(hex::decode(payload).unwrap()).unwrap(),
                    "str_rot13" => rot13(&payload),
                    other => panic!("unexpected decoder {other}"),
                }
            }
            Node::Binary {
                op: BinOp::BitXor,
                left,
                right,
            } => literal(*left)
                .bytes()
                .zip(literal(*right).bytes())
                .map(|(a, b)| char::from(a ^ b))
                .collect(),
            other => panic!("unexpected node {}", other.kind_name()),
        }
    }

    #[test]
    fn test_every_scheme_decodes_back() {
        let pass = StringEncoder::new(&RateConfig {
            enabled: true,
            rate: 100,
        });
        for seed in 0..32 {
            let mut ast = Ast::new();
            let mut rng = StdRng::seed_from_u64(seed);
            let text = "Hello, world! 42";
            let encoded = pass.encode(&mut ast, &mut rng, text);
            assert_eq!(decode(&ast, encoded), text);
        }
    }

    #[test]
    fn test_const_and_template_strings_skipped() {
        let mut ast = Ast::new();
        let name = ast.ident("GREETING");
        let value = ast.string("hi");
        let item = ast.alloc(Node::ConstItem { name, value });
        let decl = ast.alloc(Node::ConstDecl { consts: vec![item] });
        let part = ast.string("total: ");
        let var = ast.var("total");
        let template = ast.alloc(Node::Interpolated {
            parts: vec![part, var],
        });
        let echo = ast.echo(vec![template]);
        let mut ast = ast.with_statements(vec![decl, echo]);

        let mut rng = StdRng::seed_from_u64(0);
        let pass = StringEncoder::new(&RateConfig {
            enabled: true,
            rate: 100,
        });
        assert!(!pass.apply(&mut ast, &mut rng).unwrap());
    }

    #[test]
    fn test_plain_literal_replaced() {
        let mut ast = Ast::new();
        let s = ast.string("secret");
        let echo = ast.echo(vec![s]);
        let mut ast = ast.with_statements(vec![echo]);
        let mut rng = StdRng::seed_from_u64(6);
        let pass = StringEncoder::new(&RateConfig {
            enabled: true,
            rate: 100,
        });
        assert!(pass.apply(&mut ast, &mut rng).unwrap());
        let Node::Echo { ref exprs } = ast[echo] else {
            panic!("expected echo");
        };
        assert_eq!(decode(&ast, exprs[0]), "secret");
    }

    #[test]
    fn test_rot13_is_involution() {
        assert_eq!(rot13("Hello-Zz"), "Uryyb-Mm");
        assert_eq!(rot13(&rot13("Round trip!")), "Round trip!");
    }
}
