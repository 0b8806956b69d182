mod node_scenarios;
