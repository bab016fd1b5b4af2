fn main() -> subcoin_runes_node::Result<()> {
    subcoin_runes_node::run()
}
